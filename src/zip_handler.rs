use anyhow::{Context, Result};
use rayon::prelude::*;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;
use zip::ZipArchive;

use crate::model::ObservationRecord;
use crate::parser::parse_observations;

/// Observation bundles shipped as a ZIP of O&M XML documents.
pub struct ZipHandler {
    path: PathBuf,
}

impl ZipHandler {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Reads the `.xml` entries in archive order.
    pub fn read_xml_entries(&self) -> Result<Vec<(String, String)>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open ZIP file: {:?}", self.path))?;
        let mut archive = ZipArchive::new(file)
            .with_context(|| format!("Failed to read ZIP archive: {:?}", self.path))?;

        let mut entries = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .with_context(|| format!("Failed to read ZIP entry #{}", i))?;
            if entry.is_dir() || !entry.name().to_ascii_lowercase().ends_with(".xml") {
                continue;
            }

            let name = entry.name().to_string();
            let mut content = String::new();
            entry
                .read_to_string(&mut content)
                .with_context(|| format!("Failed to read ZIP entry: {}", name))?;
            entries.push((name, content));
        }

        Ok(entries)
    }

    /// Parses every XML entry in parallel; records keep archive order.
    pub fn load_observations(&self) -> Result<Vec<ObservationRecord>> {
        let entries = self.read_xml_entries()?;
        info!("Found {} XML entries in {:?}", entries.len(), self.path);

        let parsed: Vec<Vec<ObservationRecord>> = entries
            .par_iter()
            .map(|(name, content)| {
                parse_observations(content)
                    .with_context(|| format!("Failed to parse ZIP entry: {}", name))
            })
            .collect::<Result<_>>()?;

        Ok(parsed.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn observation(id: &str) -> String {
        format!(
            r#"<om:Observation gml:id="{}" xmlns:om="http://www.opengis.net/om/1.0" xmlns:gml="http://www.opengis.net/gml" xmlns:swe="http://www.opengis.net/swe/1.0.1">
                 <om:result><swe:DataArray><swe:values>2020-01-01T00:00:00,1@@</swe:values></swe:DataArray></om:result>
               </om:Observation>"#,
            id
        )
    }

    fn write_zip(path: &Path, entries: &[(&str, String)]) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        for (name, content) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_load_observations_from_zip() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = temp_dir.path().join("bundle.zip");
        write_zip(
            &zip_path,
            &[
                ("a.xml", observation("obs-a")),
                ("readme.txt", "not an observation".to_string()),
                ("nested/b.XML", observation("obs-b")),
            ],
        );

        let records = ZipHandler::new(&zip_path).load_observations().unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["obs-a", "obs-b"]);
    }

    #[test]
    fn test_broken_entry_names_the_entry() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = temp_dir.path().join("broken.zip");
        write_zip(&zip_path, &[("bad.xml", "<om:Observation>".to_string())]);

        let err = ZipHandler::new(&zip_path).load_observations().unwrap_err();
        assert!(format!("{:#}", err).contains("bad.xml"));
    }
}
