//! Request blocks: the raw request fields a client sends to a server.
//!
//! Only the fields the client fills in travel; the server parses source
//! and signal again, so the derived parts of a [`RequestDescriptor`]
//! (function, subset, name-value pairs) are not on the wire.

use super::wire_codec::WireCodec;
use super::xdr::{WireReader, WireWriter};
use crate::error::{protocol_codes, Result};
use crate::protocol::version::{self, Field};
use crate::protocol::{MAX_META, MAX_NAME, STRING_LENGTH};
use crate::request::{RequestDescriptor, RequestKind};

fn encode_request(request: &RequestDescriptor, writer: &mut WireWriter, version: i32) -> Result<()> {
    writer.put_i32(request.request.id());
    writer.put_i32(request.exp_number);
    writer.put_i32(request.pass);
    for field in [
        &request.tpass,
        &request.archive,
        &request.device_name,
        &request.server,
        &request.path,
        &request.file,
        &request.format,
    ] {
        writer.put_string(field, STRING_LENGTH)?;
    }
    writer.put_string(&request.signal, MAX_META)?;
    if version::has(version, Field::RequestSource) {
        writer.put_string(&request.source, MAX_META)?;
        writer.put_string(&request.api_delim, MAX_NAME)?;
    }
    if version::has(version, Field::RequestPut) {
        writer.put_bool(request.put);
    }
    Ok(())
}

fn decode_request(reader: &mut WireReader, version: i32) -> Result<RequestDescriptor> {
    let mut request = RequestDescriptor {
        request: RequestKind::from_id(reader.get_i32()?),
        exp_number: reader.get_i32()?,
        pass: reader.get_i32()?,
        ..RequestDescriptor::default()
    };
    for field in [
        &mut request.tpass,
        &mut request.archive,
        &mut request.device_name,
        &mut request.server,
        &mut request.path,
        &mut request.file,
        &mut request.format,
    ] {
        *field = reader.get_string(STRING_LENGTH)?;
    }
    request.signal = reader.get_string(MAX_META)?;
    if version::has(version, Field::RequestSource) {
        request.source = reader.get_string(MAX_META)?;
        request.api_delim = reader.get_string(MAX_NAME)?;
    }
    if version::has(version, Field::RequestPut) {
        request.put = reader.get_bool()?;
    }
    Ok(request)
}

/// The requests of one client call.
///
/// The count is on the wire only above version 7; older peers exchange
/// exactly one request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestBlock(pub Vec<RequestDescriptor>);

impl WireCodec for RequestBlock {
    const NAME: &'static str = "RequestBlock";

    fn encode_into(&self, writer: &mut WireWriter, version: i32) -> Result<()> {
        writer.set_section(protocol_codes::STATE);
        if version::has(version, Field::RequestBlockCount) {
            writer.put_count(self.0.len())?;
        } else if self.0.len() != 1 {
            return Err(writer.error(format!(
                "Protocol version {} carries exactly one request, not {}",
                version,
                self.0.len()
            )));
        }
        for request in &self.0 {
            encode_request(request, writer, version)?;
        }
        Ok(())
    }

    fn decode_from(reader: &mut WireReader, version: i32) -> Result<Self> {
        reader.set_section(protocol_codes::STATE);
        let count = if version::has(version, Field::RequestBlockCount) {
            reader.get_count()?
        } else {
            1
        };
        let mut requests = Vec::new();
        for _ in 0..count {
            requests.push(decode_request(reader, version)?);
        }
        Ok(Self(requests))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PROTOCOL_VERSION;

    fn request() -> RequestDescriptor {
        RequestDescriptor {
            request: RequestKind::Generic,
            exp_number: 99999,
            pass: 3,
            tpass: "LATEST".to_string(),
            archive: "AMC".to_string(),
            signal: "AMC::PLASMA_CURRENT[10:20:2]".to_string(),
            source: "99999/3".to_string(),
            api_delim: "::".to_string(),
            put: true,
            ..RequestDescriptor::default()
        }
    }

    #[test]
    fn test_request_block_roundtrip() {
        let block = RequestBlock(vec![request(), RequestDescriptor::new("/data/x.nc", "ip", "::")]);
        let bytes = block.encode(PROTOCOL_VERSION).unwrap();
        assert_eq!(RequestBlock::decode(bytes, PROTOCOL_VERSION).unwrap(), block);
    }

    #[test]
    fn test_version_gates() {
        let block = RequestBlock(vec![request()]);

        let v7 = RequestBlock::decode(block.encode(7).unwrap(), 7).unwrap();
        assert_eq!(v7, block);

        let v6 = RequestBlock::decode(block.encode(6).unwrap(), 6).unwrap();
        assert!(!v6.0[0].put);
        assert_eq!(v6.0[0].source, "99999/3");

        let v5 = RequestBlock::decode(block.encode(5).unwrap(), 5).unwrap();
        assert_eq!(v5.0[0].source, "");
        assert_eq!(v5.0[0].api_delim, "");
        assert_eq!(v5.0[0].signal, block.0[0].signal);
    }

    #[test]
    fn test_single_request_below_version_8() {
        let block = RequestBlock(vec![request(), request()]);
        assert!(block.encode(7).is_err());
        assert!(block.encode(8).is_ok());
    }

    #[test]
    fn test_overlong_field_rejected() {
        let mut long = request();
        long.archive = "A".repeat(STRING_LENGTH + 1);
        let err = RequestBlock(vec![long]).encode(PROTOCOL_VERSION).unwrap_err();
        assert_eq!(err.code(), protocol_codes::STATE);
    }
}
