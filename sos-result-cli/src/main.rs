use anyhow::{Context, Result};
use clap::Parser;
use rayon::ThreadPoolBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use sos_result::codec::parse_timestamp;
use sos_result::parser::parse_observation_file;
use sos_result::{
    parse_get_result, GetResultRequest, MemoryStore, ObservationCriteria, ObservationRecord,
    ResponseWriter, ResultService, ServiceConfig, TemporalPredicate, Timestamp, ZipHandler,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Observation XML file, ZIP archive, or directory of them
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// GetResult request document. Its template id and eventTime filters replace
    /// --template-id, --equals, --after, --before and --during; the
    /// --procedure, --observed-property and --feature flags still apply
    #[arg(short, long, value_name = "FILE")]
    request: Option<PathBuf>,

    /// Template id used when no request document is given
    #[arg(long, default_value = "urn:sos-result:template:cli")]
    template_id: String,

    /// Only results of this procedure (repeatable)
    #[arg(long)]
    procedure: Vec<String>,

    /// Only results of this observed property (repeatable)
    #[arg(long)]
    observed_property: Vec<String>,

    /// Only results of this feature of interest (repeatable)
    #[arg(long)]
    feature: Vec<String>,

    /// TM_Equals instant
    #[arg(long, value_parser = parse_time_arg)]
    equals: Option<Timestamp>,

    /// TM_After instant
    #[arg(long, value_parser = parse_time_arg)]
    after: Option<Timestamp>,

    /// TM_Before instant
    #[arg(long, value_parser = parse_time_arg)]
    before: Option<Timestamp>,

    /// TM_During period as BEGIN/END
    #[arg(long, value_parser = parse_period_arg)]
    during: Option<(Timestamp, Timestamp)>,

    /// Wrap the values in a GetResultResponse document
    #[arg(long)]
    xml: bool,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Parser threads (default: number of CPU cores)
    #[arg(short, long)]
    threads: Option<usize>,
}

fn parse_time_arg(value: &str) -> std::result::Result<Timestamp, String> {
    parse_timestamp(value).map_err(|e| e.to_string())
}

fn parse_period_arg(value: &str) -> std::result::Result<(Timestamp, Timestamp), String> {
    let (begin, end) = value
        .split_once('/')
        .ok_or_else(|| format!("expected BEGIN/END, got '{}'", value))?;
    let begin = parse_time_arg(begin)?;
    let end = parse_time_arg(end)?;
    TemporalPredicate::during(begin, end).map_err(|e| e.to_string())?;
    Ok((begin, end))
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI arguments
    let args = Args::parse();

    // Record the start time
    let start_time = std::time::Instant::now();

    // Configure the thread pool
    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to build thread pool")?;
    }

    // Load observations from the input path
    let records = load_input(&args.input)?;
    info!("Loaded {} observations", records.len());
    let store: MemoryStore = records.into_iter().collect();

    // Request from a document, or from the filter flags
    let request = match &args.request {
        Some(path) => {
            let xml = fs::read_to_string(path)
                .with_context(|| format!("Failed to read request: {:?}", path))?;
            parse_get_result(&xml).with_context(|| format!("Invalid request: {:?}", path))?
        }
        None => GetResultRequest {
            template_id: args.template_id.clone(),
            event_time: event_time_from_args(&args),
        },
    };

    // Register the template and run GetResult
    let service = ResultService::new(store, ServiceConfig::default());
    service.register_template(request.template_id.clone(), criteria_from_args(&args));

    let response = service.get_result(&request)?;
    let document = if args.xml {
        ResponseWriter::new().write_get_result(&response)?
    } else {
        response.values
    };

    // Write the values or the response document
    match &args.output {
        Some(path) => {
            fs::write(path, document).with_context(|| format!("Failed to write {:?}", path))?;
            info!("Written: {:?}", path);
        }
        None => print!("{}", document),
    }

    // Show the processing time
    info!("Total processing time: {:?}", start_time.elapsed());
    Ok(())
}

fn event_time_from_args(args: &Args) -> Vec<TemporalPredicate> {
    let mut event_time = Vec::new();
    if let Some(t) = args.equals {
        event_time.push(TemporalPredicate::Equals(t));
    }
    if let Some(t) = args.after {
        event_time.push(TemporalPredicate::After(t));
    }
    if let Some(t) = args.before {
        event_time.push(TemporalPredicate::Before(t));
    }
    if let Some((begin, end)) = args.during {
        event_time.push(TemporalPredicate::During { begin, end });
    }
    event_time
}

fn criteria_from_args(args: &Args) -> ObservationCriteria {
    ObservationCriteria {
        procedures: args.procedure.clone(),
        observed_properties: args.observed_property.clone(),
        features_of_interest: args.feature.clone(),
        event_time: Vec::new(),
    }
}

fn load_input(input: &Path) -> Result<Vec<ObservationRecord>> {
    if input.is_file() {
        match file_type(input) {
            Some(FileType::Zip) => {
                info!("Processing ZIP file: {:?}", input);
                ZipHandler::new(input).load_observations()
            }
            Some(FileType::Xml) => {
                info!("Processing XML file: {:?}", input);
                load_file(input, FileType::Xml)
            }
            None => {
                error!("Unsupported file type: {:?}", input);
                anyhow::bail!("Input file must be .xml or .zip");
            }
        }
    } else if input.is_dir() {
        info!("Processing directory: {:?}", input);
        load_directory(input)
    } else {
        error!("Invalid input path: {:?}", input);
        anyhow::bail!("Input path must be a file or directory");
    }
}

fn load_file(path: &Path, file_type: FileType) -> Result<Vec<ObservationRecord>> {
    match file_type {
        // Parse the XML file
        FileType::Xml => parse_observation_file(path)
            .with_context(|| format!("Failed to parse {:?}", path)),
        // Parse every XML entry of the archive
        FileType::Zip => ZipHandler::new(path).load_observations(),
    }
}

fn load_directory(dir: &Path) -> Result<Vec<ObservationRecord>> {
    use rayon::prelude::*;

    let mut input_files = Vec::new();
    collect_input_files(dir, &mut input_files)?;
    input_files.sort();
    info!("Found {} input files (XML/ZIP)", input_files.len());

    let results: Vec<Result<Vec<ObservationRecord>>> = input_files
        .par_iter()
        .map(|(path, file_type)| load_file(path, *file_type))
        .collect();

    let mut records = Vec::new();
    let mut errors = Vec::new();
    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(parsed) => records.extend(parsed),
            Err(e) => errors.push(format!("{}: {:#}", input_files[i].0.display(), e)),
        }
    }

    if !errors.is_empty() {
        error!("Failed to load {} files:", errors.len());
        for err in &errors {
            error!("  {}", err);
        }
        anyhow::bail!("{} files failed to load", errors.len());
    }

    Ok(records)
}

fn collect_input_files(dir: &Path, files: &mut Vec<(PathBuf, FileType)>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {:?}", dir))? {
        let path = entry?.path();
        if path.is_dir() {
            collect_input_files(&path, files)?;
        } else if let Some(file_type) = file_type(&path) {
            files.push((path, file_type));
        }
    }
    Ok(())
}

fn file_type(path: &Path) -> Option<FileType> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .as_deref()
    {
        Some("xml") => Some(FileType::Xml),
        Some("zip") => Some(FileType::Zip),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum FileType {
    Xml,
    Zip,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_period_arg() {
        let (begin, end) = parse_period_arg("2020-01-01T12:00:00/2020-01-03T00:00:00").unwrap();
        assert!(begin < end);

        assert!(parse_period_arg("2020-01-03T00:00:00/2020-01-01T00:00:00").is_err());
        assert!(parse_period_arg("2020-01-01T00:00:00").is_err());
    }

    #[test]
    fn test_request_keeps_facet_flags() {
        let args = Args::parse_from([
            "sos-result",
            "data",
            "--request",
            "request.xml",
            "--procedure",
            "urn:ogc:object:sensor:station-1",
        ]);
        assert_eq!(
            criteria_from_args(&args).procedures,
            vec!["urn:ogc:object:sensor:station-1".to_string()]
        );
    }
}
