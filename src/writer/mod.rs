use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{Result, SosError};
use crate::request::GetResultResponse;

pub const SOS_NAMESPACE: &str = "http://www.opengis.net/sos/1.0";
pub const OWS_NAMESPACE: &str = "http://www.opengis.net/ows/1.1";

/// Serializes SOS responses and OWS exception reports.
#[derive(Debug, Clone)]
pub struct ResponseWriter {
    indent: usize,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer without indentation, for byte-exact output.
    pub fn compact() -> Self {
        Self { indent: 0 }
    }

    fn xml_writer(&self) -> Writer<Vec<u8>> {
        if self.indent == 0 {
            Writer::new(Vec::new())
        } else {
            Writer::new_with_indent(Vec::new(), b' ', self.indent)
        }
    }

    fn finish(writer: Writer<Vec<u8>>) -> String {
        String::from_utf8_lossy(&writer.into_inner()).into_owned()
    }

    pub fn write_get_result(&self, response: &GetResultResponse) -> Result<String> {
        let mut writer = self.xml_writer();

        // XML declaration
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        // Root element with the SOS namespace
        let mut root = BytesStart::new("sos:GetResultResponse");
        root.push_attribute(("xmlns:sos", SOS_NAMESPACE));
        writer.write_event(Event::Start(root))?;

        // Values tagged with the template id
        let mut result = BytesStart::new("sos:result");
        result.push_attribute(("RS", response.template_id.as_str()));
        writer.write_event(Event::Start(result))?;
        writer.write_event(Event::Text(BytesText::new(&response.values)))?;
        writer.write_event(Event::End(BytesEnd::new("sos:result")))?;

        writer.write_event(Event::End(BytesEnd::new("sos:GetResultResponse")))?;

        Ok(Self::finish(writer))
    }

    pub fn write_exception_report(&self, error: &SosError) -> Result<String> {
        let mut writer = self.xml_writer();

        // XML declaration
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        // Root element with the OWS namespace
        let mut root = BytesStart::new("ows:ExceptionReport");
        root.push_attribute(("xmlns:ows", OWS_NAMESPACE));
        root.push_attribute(("version", "1.1.0"));
        writer.write_event(Event::Start(root))?;

        // Exception code and, when known, the offending parameter
        let mut exception = BytesStart::new("ows:Exception");
        exception.push_attribute(("exceptionCode", error.exception_code().as_str()));
        if let Some(locator) = error.locator() {
            exception.push_attribute(("locator", locator));
        }
        writer.write_event(Event::Start(exception))?;

        // Error message
        writer.write_event(Event::Start(BytesStart::new("ows:ExceptionText")))?;
        writer.write_event(Event::Text(BytesText::new(&error.to_string())))?;
        writer.write_event(Event::End(BytesEnd::new("ows:ExceptionText")))?;

        writer.write_event(Event::End(BytesEnd::new("ows:Exception")))?;
        writer.write_event(Event::End(BytesEnd::new("ows:ExceptionReport")))?;

        Ok(Self::finish(writer))
    }
}
