//! HTTP-XML identification fallback (spec §4.5.1, §6.2): used when a VXI-11 instrument
//! answers `*IDN?` with nothing, e.g. a power-on default or a link that only exposes LXI
//! discovery, not SCPI.

use std::time::Duration;

use crate::{
    config::LXI_ID_LENGTH_MAX,
    error::{Error, Result},
    protocol::{self, Transport, raw::RawTransport},
};

const REQUEST: &[u8] = b"GET /lxi/identification HTTP/1.0\r\n\r\n";
const HTTP_PORT: u16 = 80;

/// Fetch and parse `/lxi/identification`, returning `"<Manufacturer>,<Model>,<SerialNumber>,
/// <FirmwareRevision>"`. Goes straight to [`RawTransport`] rather than through
/// [`protocol::new_transport`] because it needs [`RawTransport::receive_wait`], which reads
/// to EOF rather than the single-chunk [`Transport::receive`].
pub async fn fetch(address: &str, timeout: Duration) -> Result<String> {
    let addr = protocol::resolve(address, HTTP_PORT).await?;
    let mut transport = RawTransport::new(addr);
    transport.connect(timeout).await?;

    let result = async {
        transport.send(REQUEST, timeout).await?;

        let raw = transport.receive_wait(timeout).await?;

        let body = String::from_utf8_lossy(&raw);
        let xml_start = body.find("<?xml").ok_or_else(|| Error::Io("no XML body in HTTP response".into()))?;
        parse_identification(&body[xml_start..])
    }
    .await;

    let _ = transport.disconnect().await;
    result
}

fn parse_identification(xml: &str) -> Result<String> {
    let fields = ["Manufacturer", "Model", "SerialNumber", "FirmwareRevision"];
    let mut values = Vec::with_capacity(fields.len());

    for field in fields {
        values.push(extract_tag(xml, field).unwrap_or_default());
    }

    let id = values.join(",");
    if id.len() > LXI_ID_LENGTH_MAX {
        return Err(Error::Buffer(format!("identification string exceeds {LXI_ID_LENGTH_MAX} bytes")));
    }
    Ok(id)
}

fn extract_tag(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");

    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(xml[start..end].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_four_identification_fields() {
        let xml = "<?xml version=\"1.0\"?><LXIDevice><Manufacturer>Acme</Manufacturer>\
                   <Model>9000</Model><SerialNumber>SN1</SerialNumber>\
                   <FirmwareRevision>1.2</FirmwareRevision></LXIDevice>";

        assert_eq!(parse_identification(xml).unwrap(), "Acme,9000,SN1,1.2");
    }

    #[test]
    fn missing_field_becomes_an_empty_slot_not_an_error() {
        let xml = "<?xml version=\"1.0\"?><LXIDevice><Manufacturer>Acme</Manufacturer></LXIDevice>";
        assert_eq!(parse_identification(xml).unwrap(), "Acme,,,");
    }
}
