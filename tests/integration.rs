//! Integration tests for uda-core.
//!
//! These tests verify the integration between the request parser, the
//! codec and the framed session.

use uda_core::codec::{
    compress_dim, decompress_dim, ArrayData, ClientState, DataBlock, DataBlockList, Dimension,
    DimValues, RequestBlock, ServerState, WireCodec,
};
use uda_core::config::Config;
use uda_core::error::CODE_ERROR;
use uda_core::error_stack::ErrorStack;
use uda_core::path::PathReplacement;
use uda_core::protocol::{build_frame, FrameBuffer, Header, MessageType, PROTOCOL_VERSION};
use uda_core::request::{parse_subset, PluginClass, PluginRegistry, RequestKind, RequestParser};
use uda_core::{RequestDescriptor, Role, Session};

fn parse(registry: &PluginRegistry, source: &str, signal: &str) -> uda_core::Result<RequestDescriptor> {
    let config = Config::default();
    let mut stack = ErrorStack::new();
    RequestParser::new(&config, registry).parse(source, signal, "", &mut stack)
}

/// A file-class plugin registered at runtime is selected by its prefix.
#[test]
fn test_registered_file_plugin() {
    let mut registry = PluginRegistry::new();
    let kind = registry.register_plugin("NETCDF", PluginClass::File, "nc");

    let request = parse(&registry, "NETCDF::/data/shot1.nc", "").unwrap();

    assert_eq!(request.request, kind);
    assert_eq!(request.format, "NETCDF");
    assert_eq!(request.file, "shot1.nc");
    assert_eq!(request.path, "");
}

/// Raw strings sent over the wire parse to the same request server-side.
#[test]
fn test_request_survives_the_wire_at_every_version() {
    let registry = PluginRegistry::with_standard_plugins();
    let local = parse(&registry, "99999/3", "AMC::PLASMA_CURRENT[10:20:2]").unwrap();

    for version in [6, 7, PROTOCOL_VERSION] {
        let raw = RequestBlock(vec![RequestDescriptor::new(
            "99999/3",
            "AMC::PLASMA_CURRENT[10:20:2]",
            "::",
        )]);
        let received = RequestBlock::decode(raw.encode(version).unwrap(), version).unwrap();
        let sent = &received.0[0];
        let remote = parse(&registry, &sent.source, &sent.signal).unwrap();

        assert_eq!(remote.request, RequestKind::Generic);
        assert_eq!(remote.exp_number, local.exp_number);
        assert_eq!(remote.pass, 3);
        assert_eq!(remote.archive, "AMC");
        assert_eq!(remote.signal, "PLASMA_CURRENT");
        assert_eq!(remote.datasubset, local.datasubset);
    }
}

/// `a:b:c` subsets always count `ceil((b-a+1)/c)` elements and stop at `b`.
#[test]
fn test_subset_count_law() {
    for a in 0i64..12 {
        for b in a..30 {
            for c in 1i64..6 {
                let subset = parse_subset(&format!("[{}:{}:{}]", a, b, c)).unwrap();
                let dim = &subset.dims[0];
                assert_eq!(dim.count, (b - a + 1 + c - 1) / c, "[{}:{}:{}]", a, b, c);
                assert_eq!(dim.stop, b);
                assert_eq!(dim.stride, c);
            }
        }
    }
}

#[test]
fn test_last_element_subset() {
    let subset = parse_subset("[#][2:4]").unwrap();
    assert_eq!(subset.rank(), 2);
    assert_eq!(subset.dims[0].start, -1);
    assert!(subset.dims[0].is_index);
    assert_eq!(subset.dims[1].count, 3);
}

/// Private path rules loaded from configuration keep wildcard elements.
#[test]
fn test_path_replacement_from_config() {
    let config = Config::from_json_str(
        r#"{ "private_path_target": "/A/*/C", "private_path_substitute": "/X/*/Z" }"#,
    )
    .unwrap();
    let rules = PathReplacement::from_config(&config).unwrap();

    assert_eq!(rules.apply("/A/foo/C/bar").unwrap(), "/X/foo/Z/bar");
    assert_eq!(rules.apply("/B/foo/C/bar").unwrap(), "/B/foo/C/bar");
}

/// Encoded blocks reassemble from arbitrarily fragmented reads.
#[test]
fn test_fragmented_block_stream() {
    let list = DataBlockList(vec![
        DataBlock::new(ArrayData::Float((0..500).map(|i| i as f32).collect())),
        DataBlock::new(ArrayData::Short(vec![-1, 0, 1])),
    ]);
    let payload = list.encode(PROTOCOL_VERSION).unwrap();
    let mut bytes = build_frame(
        &Header::new(MessageType::DataBlockList, 0, 7, payload.len() as u32),
        &payload,
    );
    bytes.extend(build_frame(&Header::new(MessageType::Closedown, 0, 8, 0), &[]));

    let mut buffer = FrameBuffer::new();
    let mut frames = Vec::new();
    for chunk in bytes.chunks(7) {
        frames.extend(buffer.push(chunk).unwrap());
    }

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].sequence(), 7);
    assert!(frames[1].is_closedown());
    let decoded = DataBlockList::decode(frames[0].payload_bytes(), PROTOCOL_VERSION).unwrap();
    assert_eq!(decoded, list);
}

/// A time axis sent compressed comes back as the same literal values.
#[test]
fn test_compressed_time_axis_roundtrip() {
    let times: Vec<f64> = (0..200).map(|i| i as f64 * 0.25).collect();
    let mut axis = Dimension::literal(ArrayData::Double(times.clone())).with_units("s");
    assert!(compress_dim(&mut axis));

    let block = DataBlock::new(ArrayData::Float(vec![1.5; 200])).with_dims(vec![axis]);
    let decoded = DataBlock::decode(block.encode(PROTOCOL_VERSION).unwrap(), PROTOCOL_VERSION).unwrap();

    let axis = &decoded.dims[0];
    assert!(matches!(axis.values, DimValues::Linear { .. }));
    assert_eq!(axis.units, "s");
    assert_eq!(decompress_dim(axis).unwrap(), ArrayData::Double(times));
}

/// A full client/server exchange: the server parses what the client sent,
/// answers good requests with data and bad ones with its error stack.
#[tokio::test]
async fn test_client_server_exchange() {
    let (a, b) = tokio::io::duplex(64 * 1024);
    let mut client = Session::new(a, Role::Client);
    let mut server = Session::new(b, Role::Server);

    let server_task = tokio::spawn(async move {
        let config = Config::default();
        let registry = PluginRegistry::with_standard_plugins();
        let parser = RequestParser::new(&config, &registry);

        server.server_handshake(&ServerState::default()).await.unwrap();
        let mut served = 0;
        while let Some(requests) = server.recv_request().await.unwrap() {
            let mut state = ServerState::default();
            let mut stack = ErrorStack::new();
            let mut blocks = Vec::new();
            for request in &requests.0 {
                match parser.parse(&request.source, &request.signal, &request.api_delim, &mut stack) {
                    Ok(parsed) => {
                        let n = parsed.datasubset.dims.first().map_or(4, |d| d.count as usize);
                        blocks.push(
                            DataBlock::new(ArrayData::Int((0..n as i32).collect()))
                                .with_dims(vec![Dimension::index(n)]),
                        );
                    }
                    Err(_) => blocks.push(DataBlock::new(ArrayData::Int(Vec::new()))),
                }
            }
            state.set_errors(stack);
            server.send_data(&DataBlockList(blocks), &state).await.unwrap();
            served += 1;
        }
        served
    });

    client.client_handshake(&ClientState::default()).await.unwrap();
    assert_eq!(client.version(), Some(PROTOCOL_VERSION));

    client
        .send_request(&RequestBlock(vec![RequestDescriptor::new(
            "12345",
            "AMC::ip[0:9:3]",
            "::",
        )]))
        .await
        .unwrap();
    let (state, data) = client.recv_data().await.unwrap();
    assert_eq!(state.error, 0);
    assert_eq!(data.0[0].data, Some(ArrayData::Int(vec![0, 1, 2, 3])));
    assert_eq!(decompress_dim(&data.0[0].dims[0]).unwrap(), ArrayData::Int(vec![0, 1, 2, 3]));

    client
        .send_request(&RequestBlock(vec![RequestDescriptor::new("  ", "", "::")]))
        .await
        .unwrap();
    let (state, data) = client.recv_data().await.unwrap();
    assert_eq!(state.error, CODE_ERROR);
    assert_eq!(state.msg, "Neither Data Object nor Source specified!");
    assert_eq!(data.0[0].data_n, 0);

    client.close().await.unwrap();
    assert_eq!(server_task.await.unwrap(), 2);
}
