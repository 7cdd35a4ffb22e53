//! Parse sitemap.xml and sitemap index files.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::types::{HunterError, HunterResult};

/// Every `<loc>` inside a `<url>` or `<sitemap>` element, in document order.
///
/// `document` names the sitemap in the error returned for broken XML.
pub fn parse_locations(xml: &str, document: &str) -> HunterResult<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut locations = Vec::new();
    let mut in_entry = false;
    let mut in_loc = false;
    let mut current = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"url" | b"sitemap" => {
                    in_entry = true;
                    current.clear();
                }
                b"loc" if in_entry => in_loc = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"url" | b"sitemap" => {
                    if in_entry && !current.is_empty() {
                        locations.push(std::mem::take(&mut current));
                    }
                    in_entry = false;
                }
                b"loc" => in_loc = false,
                _ => {}
            },
            Ok(Event::Text(e)) if in_loc => {
                let text = e
                    .unescape()
                    .map_err(|err| HunterError::malformed(document, format!("bad text: {err}")))?;
                current.push_str(text.trim());
            }
            Ok(Event::CData(e)) if in_loc => {
                current.push_str(String::from_utf8_lossy(&e).trim());
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(HunterError::malformed(document, format!("XML parse error: {e}")));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(locations)
}
