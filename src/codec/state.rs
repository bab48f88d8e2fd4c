//! Handshake blocks: what the client and server tell each other about
//! themselves.
//!
//! Both blocks start with the sender's protocol version. The fields that
//! follow are written and read at `min(sender version, session version)`,
//! so a peer always understands the block regardless of who is newer.

use super::wire_codec::WireCodec;
use super::xdr::{WireReader, WireWriter};
use crate::error::{protocol_codes, Result};
use crate::error_stack::{ErrorKind, ErrorRecord, ErrorStack};
use crate::protocol::version::{self, Field, PROTOCOL_VERSION};
use crate::protocol::STRING_LENGTH;
use crate::strings::truncate_bytes;

/// Data-shaping options a client asks the server to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataOptions {
    pub no_dim_data: bool,
    pub data_double: bool,
    pub time_double: bool,
    pub dim_double: bool,
    pub scalar: bool,
    pub bytes: bool,
    pub bad: bool,
    pub meta: bool,
    pub as_is: bool,
    pub uncalibrated: bool,
    pub no_offset: bool,
}

impl DataOptions {
    fn as_array(&self) -> [bool; 11] {
        [
            self.no_dim_data,
            self.data_double,
            self.time_double,
            self.dim_double,
            self.scalar,
            self.bytes,
            self.bad,
            self.meta,
            self.as_is,
            self.uncalibrated,
            self.no_offset,
        ]
    }

    fn from_array(values: [bool; 11]) -> Self {
        let [no_dim_data, data_double, time_double, dim_double, scalar, bytes, bad, meta, as_is, uncalibrated, no_offset] =
            values;
        Self {
            no_dim_data,
            data_double,
            time_double,
            dim_double,
            scalar,
            bytes,
            bad,
            meta,
            as_is,
            uncalibrated,
            no_offset,
        }
    }
}

/// Client identity and preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientState {
    pub version: i32,
    pub pid: i32,
    /// Server idle timeout in seconds.
    pub timeout: i32,
    pub uid: String,
    pub client_flags: u32,
    pub alt_rank: i32,
    pub options: DataOptions,
    pub private_flags: u32,
    pub os_name: String,
    pub doi: String,
}

impl Default for ClientState {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION,
            pid: std::process::id() as i32,
            timeout: 600,
            uid: String::new(),
            client_flags: 0,
            alt_rank: 0,
            options: DataOptions::default(),
            private_flags: 0,
            os_name: std::env::consts::OS.to_string(),
            doi: String::new(),
        }
    }
}

impl WireCodec for ClientState {
    const NAME: &'static str = "ClientState";

    fn encode_into(&self, writer: &mut WireWriter, version: i32) -> Result<()> {
        writer.set_section(protocol_codes::STATE);
        let effective = self.version.min(version);
        writer.put_i32(self.version);
        writer.put_i32(self.pid);
        writer.put_i32(self.timeout);
        writer.put_string(&self.uid, STRING_LENGTH)?;

        if version::has(effective, Field::ClientFlags) {
            writer.put_u32(self.client_flags);
        } else {
            // legacy peers expect an unused integer here
            writer.put_i32(0);
        }
        writer.put_i32(self.alt_rank);

        for option in self.options.as_array() {
            writer.put_bool(option);
        }
        if version::has(effective, Field::ClientPrivateFlags) {
            writer.put_u32(self.private_flags);
        }
        if version::has(effective, Field::ClientOsName) {
            writer.put_string(&self.os_name, STRING_LENGTH)?;
            writer.put_string(&self.doi, STRING_LENGTH)?;
        }
        Ok(())
    }

    fn decode_from(reader: &mut WireReader, version: i32) -> Result<Self> {
        reader.set_section(protocol_codes::STATE);
        let client_version = reader.get_i32()?;
        let effective = client_version.min(version);
        let pid = reader.get_i32()?;
        let timeout = reader.get_i32()?;
        let uid = reader.get_string(STRING_LENGTH)?;

        let (client_flags, alt_rank) = if version::has(effective, Field::ClientFlags) {
            (reader.get_u32()?, reader.get_i32()?)
        } else {
            reader.get_i32()?;
            reader.get_i32()?;
            (0, 0)
        };

        let mut options = [false; 11];
        for option in options.iter_mut() {
            *option = reader.get_bool()?;
        }
        let private_flags = if version::has(effective, Field::ClientPrivateFlags) {
            reader.get_u32()?
        } else {
            0
        };
        let (os_name, doi) = if version::has(effective, Field::ClientOsName) {
            (reader.get_string(STRING_LENGTH)?, reader.get_string(STRING_LENGTH)?)
        } else {
            (String::new(), String::new())
        };

        tracing::debug!(client_version, effective, %uid, "client state");
        Ok(Self {
            version: client_version,
            pid,
            timeout,
            uid,
            client_flags,
            alt_rank,
            options: DataOptions::from_array(options),
            private_flags,
            os_name,
            doi,
        })
    }
}

/// Server identity plus the error stack of the last request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerState {
    pub version: i32,
    /// First error code of the last request, 0 on success.
    pub error: i32,
    pub msg: String,
    pub os_name: String,
    pub doi: String,
    pub errors: ErrorStack,
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION,
            error: 0,
            msg: String::new(),
            os_name: std::env::consts::OS.to_string(),
            doi: String::new(),
            errors: ErrorStack::new(),
        }
    }
}

impl ServerState {
    /// Take over `stack`; its first record becomes the headline error.
    pub fn set_errors(&mut self, stack: ErrorStack) {
        match stack.first() {
            Some(first) => {
                self.error = first.code;
                self.msg = truncate_bytes(&first.message, STRING_LENGTH).to_string();
            }
            None => {
                self.error = 0;
                self.msg.clear();
            }
        }
        self.errors = stack;
    }
}

impl WireCodec for ServerState {
    const NAME: &'static str = "ServerState";

    fn encode_into(&self, writer: &mut WireWriter, version: i32) -> Result<()> {
        writer.set_section(protocol_codes::STATE);
        let effective = self.version.min(version);
        writer.put_i32(self.version);
        writer.put_i32(self.error);
        writer.put_count(self.errors.len())?;
        writer.put_string(&self.msg, STRING_LENGTH)?;
        if version::has(effective, Field::ServerOsName) {
            writer.put_string(&self.os_name, STRING_LENGTH)?;
            writer.put_string(&self.doi, STRING_LENGTH)?;
        }
        for record in self.errors.records() {
            writer.put_i32(record.kind.as_i32());
            writer.put_i32(record.code);
            writer.put_string(&record.location, STRING_LENGTH)?;
            writer.put_string(&record.message, STRING_LENGTH)?;
        }
        Ok(())
    }

    fn decode_from(reader: &mut WireReader, version: i32) -> Result<Self> {
        reader.set_section(protocol_codes::STATE);
        let server_version = reader.get_i32()?;
        let effective = server_version.min(version);
        let error = reader.get_i32()?;
        let nerrors = reader.get_count()?;
        let msg = reader.get_string(STRING_LENGTH)?;
        let (os_name, doi) = if version::has(effective, Field::ServerOsName) {
            (reader.get_string(STRING_LENGTH)?, reader.get_string(STRING_LENGTH)?)
        } else {
            (String::new(), String::new())
        };

        let mut errors = ErrorStack::new();
        for _ in 0..nerrors {
            let kind = ErrorKind::from_i32(reader.get_i32()?);
            let code = reader.get_i32()?;
            let location = reader.get_string(STRING_LENGTH)?;
            let message = reader.get_string(STRING_LENGTH)?;
            errors.push(ErrorRecord {
                kind,
                location,
                code,
                message,
            });
        }

        Ok(Self {
            version: server_version,
            error,
            msg,
            os_name,
            doi,
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UdaError;

    fn client() -> ClientState {
        ClientState {
            pid: 4242,
            uid: "jdoe".to_string(),
            client_flags: 0b101,
            alt_rank: 2,
            options: DataOptions {
                data_double: true,
                no_offset: true,
                ..DataOptions::default()
            },
            private_flags: 7,
            os_name: "linux".to_string(),
            doi: "10.1000/xyz".to_string(),
            ..ClientState::default()
        }
    }

    #[test]
    fn test_client_state_roundtrip() {
        let state = client();
        let bytes = state.encode(PROTOCOL_VERSION).unwrap();
        assert_eq!(ClientState::decode(bytes, PROTOCOL_VERSION).unwrap(), state);
    }

    #[test]
    fn test_client_state_at_version_5() {
        let state = client();
        let decoded = ClientState::decode(state.encode(5).unwrap(), 5).unwrap();
        assert_eq!(decoded.client_flags, 0);
        assert_eq!(decoded.alt_rank, 0);
        assert_eq!(decoded.private_flags, 7);
        assert_eq!(decoded.os_name, "");
        assert_eq!(decoded.options, state.options);
    }

    #[test]
    fn test_client_state_at_version_4() {
        let decoded = ClientState::decode(client().encode(4).unwrap(), 4).unwrap();
        assert_eq!(decoded.private_flags, 0);
        assert_eq!(decoded.uid, "jdoe");
    }

    #[test]
    fn test_old_client_governs_layout() {
        let state = ClientState {
            version: 6,
            ..client()
        };
        // a current server reads what a version 6 client wrote
        let decoded = ClientState::decode(state.encode(PROTOCOL_VERSION).unwrap(), PROTOCOL_VERSION).unwrap();
        assert_eq!(decoded.version, 6);
        assert_eq!(decoded.client_flags, 0b101);
        assert_eq!(decoded.doi, "");
    }

    #[test]
    fn test_server_state_carries_error_stack() {
        let mut stack = ErrorStack::new();
        stack.record("make_request_data", UdaError::MissingRequest);
        stack.add(ErrorKind::Plugin, "netcdf", 12, "variable not found");

        let mut state = ServerState {
            os_name: "linux".to_string(),
            ..ServerState::default()
        };
        state.set_errors(stack);
        assert_eq!(state.error, 999);

        let decoded = ServerState::decode(state.encode(PROTOCOL_VERSION).unwrap(), PROTOCOL_VERSION).unwrap();
        assert_eq!(decoded, state);
        assert_eq!(decoded.errors.len(), 2);
        assert_eq!(decoded.errors.records()[1].kind, ErrorKind::Plugin);
    }

    #[test]
    fn test_overlong_parse_error_still_encodes() {
        use crate::config::Config;
        use crate::request::{PluginRegistry, RequestParser};

        let config = Config::default();
        let registry = PluginRegistry::with_standard_plugins();
        let source = format!("/data/{}.xyz", "a".repeat(2000));
        let mut stack = ErrorStack::new();
        RequestParser::new(&config, &registry)
            .parse(&source, "ip", "", &mut stack)
            .unwrap_err();

        let mut state = ServerState::default();
        state.set_errors(stack);
        assert!(state.msg.len() <= STRING_LENGTH);

        let decoded = ServerState::decode(state.encode(PROTOCOL_VERSION).unwrap(), PROTOCOL_VERSION).unwrap();
        assert_eq!(decoded, state);
        assert!(decoded.errors.records()[0].message.len() <= STRING_LENGTH);
    }

    #[test]
    fn test_server_state_before_version_7() {
        let state = ServerState {
            os_name: "linux".to_string(),
            ..ServerState::default()
        };
        let decoded = ServerState::decode(state.encode(6).unwrap(), 6).unwrap();
        assert_eq!(decoded.os_name, "");
        assert_eq!(decoded.version, PROTOCOL_VERSION);
    }
}
