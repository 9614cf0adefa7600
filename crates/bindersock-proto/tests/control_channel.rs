//! Control-channel framing over real descriptors.
//!
//! Cooperating test processes talk over pipes and files, so these tests run
//! the framer against actual kernel objects instead of in-memory cursors.

use std::{
    fs::File,
    io::{Seek, SeekFrom},
    thread,
};

use bindersock_proto::{
    ClientInfo, FileDescriptorTransportMode, ProtocolError, RpcSecurity, ServerConfig, ServerInfo,
    SocketType, read_bytes, read_record, read_string, write_bytes, write_record, write_string,
};
use proptest::prelude::*;

#[test]
fn handshake_records_cross_a_pipe() {
    let (mut reader, mut writer) = std::io::pipe().unwrap();

    let config = ServerConfig {
        num_threads: 2,
        socket_type: SocketType::Inet,
        rpc_security: RpcSecurity::Raw,
        server_version: 0,
        vsock_port: 0,
        addr: String::new(),
        server_supported_fd_modes: vec![FileDescriptorTransportMode::None],
    };
    let sent = config.clone();

    let driver = thread::spawn(move || {
        write_record(&mut writer, &sent).unwrap();
        write_record(&mut writer, &ClientInfo { certificate: Vec::new() }).unwrap();
        write_string(&mut writer, "done").unwrap();
    });

    let received: ServerConfig = read_record(&mut reader).unwrap();
    let client: ClientInfo = read_record(&mut reader).unwrap();
    let trailer = read_string(&mut reader).unwrap();
    driver.join().unwrap();

    assert_eq!(received, config);
    assert!(client.certificate.is_empty());
    assert_eq!(trailer, "done");
}

#[test]
fn writer_hangup_mid_frame_is_truncation() {
    let (mut reader, mut writer) = std::io::pipe().unwrap();

    std::io::Write::write_all(&mut writer, &16u64.to_le_bytes()).unwrap();
    std::io::Write::write_all(&mut writer, b"short").unwrap();
    drop(writer);

    let err = read_bytes(&mut reader).unwrap_err();
    assert!(matches!(err, ProtocolError::FrameTruncated { expected: 16, actual: 5 }));
}

#[test]
fn frames_persist_through_a_file() {
    let mut file: File = tempfile::tempfile().unwrap();

    write_record(&mut file, &ServerInfo { port: 8080 }).unwrap();
    write_bytes(&mut file, &[1, 2, 3]).unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();

    let info: ServerInfo = read_record(&mut file).unwrap();
    assert_eq!(info.port, 8080);
    assert_eq!(read_bytes(&mut file).unwrap(), vec![1, 2, 3]);
    assert!(read_bytes(&mut file).unwrap_err().is_truncation());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any sequence of strings written to a pipe comes back in order.
    #[test]
    fn prop_string_sequences_preserve_order(
        values in prop::collection::vec(".{0,64}", 1..8),
    ) {
        let (mut reader, mut writer) = std::io::pipe().unwrap();
        let expected = values.clone();

        let producer = thread::spawn(move || {
            for value in &values {
                write_string(&mut writer, value).unwrap();
            }
        });

        for value in &expected {
            prop_assert_eq!(&read_string(&mut reader).unwrap(), value);
        }
        producer.join().unwrap();
    }
}
