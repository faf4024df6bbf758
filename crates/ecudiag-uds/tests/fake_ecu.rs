//! End-to-end tests of the client façade against a fake DoIP entity on
//! loopback TCP.

use std::net::SocketAddr;
use std::time::Duration;

use ecudiag_uds::codec::{payload_type, DoipFrame, DoipHeader, HEADER_LEN};
use ecudiag_uds::{
    create_transport, ClientManager, ConnectionConfig, ErrorKind, SecurityConfig,
    ServiceRequest, SessionState, UdsSession,
};
use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_test::assert_ok;

const CLIENT: u16 = 0x0E80;
const SERVER: u16 = 0x1001;
const SEED: [u8; 4] = [0xB4, 0x18, 0xE1, 0xA8];
/// Level 1 key for `SEED` with constant 0xE455
const VALID_KEY: [u8; 4] = [0xBD, 0xBD, 0xB0, 0x90];
const VIN: &[u8] = b"WDB2030461A123456";

/// A DoIP entity that answers a fixed set of requests
struct FakeEcu {
    addr: SocketAddr,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl FakeEcu {
    async fn start(deny_routing: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(socket, deny_routing));
            }
        });

        Self {
            addr,
            handle: Some(handle),
        }
    }

    fn config(&self) -> ConnectionConfig {
        ConnectionConfig::new("127.0.0.1", SERVER)
            .with_port(self.addr.port())
            .with_client_address(CLIENT)
            .with_timeout(Duration::from_millis(500))
    }
}

impl Drop for FakeEcu {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn read_frame(socket: &mut TcpStream) -> Option<DoipFrame> {
    let mut header = [0u8; HEADER_LEN];
    socket.read_exact(&mut header).await.ok()?;
    let header = DoipHeader::decode(&header)?;
    let mut payload = vec![0u8; header.payload_length as usize];
    socket.read_exact(&mut payload).await.ok()?;
    Some(DoipFrame { header, payload })
}

fn uds_frame(uds: &[u8]) -> Vec<u8> {
    DoipFrame::diagnostic_message(SERVER, CLIENT, uds).encode()
}

async fn write_uds(socket: &mut TcpStream, uds: &[u8]) {
    socket.write_all(&uds_frame(uds)).await.unwrap();
}

/// Send the header and the payload of one frame in separate segments
async fn write_uds_split(socket: &mut TcpStream, uds: &[u8]) {
    let frame = uds_frame(uds);
    socket.write_all(&frame[..HEADER_LEN]).await.unwrap();
    socket.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    socket.write_all(&frame[HEADER_LEN..]).await.unwrap();
}

async fn serve(mut socket: TcpStream, deny_routing: bool) {
    while let Some(frame) = read_frame(&mut socket).await {
        match frame.payload_type() {
            payload_type::ROUTING_ACTIVATION_REQUEST => {
                let code = if deny_routing { 0x06 } else { 0x10 };
                let mut payload = Vec::new();
                payload.extend_from_slice(&CLIENT.to_be_bytes());
                payload.extend_from_slice(&SERVER.to_be_bytes());
                payload.push(code);
                payload.extend_from_slice(&[0x00; 4]);
                let response = DoipFrame::new(payload_type::ROUTING_ACTIVATION_RESPONSE, payload);
                socket.write_all(&response.encode()).await.unwrap();
            }
            payload_type::DIAGNOSTIC_MESSAGE => {
                let mut ack_payload = Vec::new();
                ack_payload.extend_from_slice(&SERVER.to_be_bytes());
                ack_payload.extend_from_slice(&CLIENT.to_be_bytes());
                ack_payload.push(0x00);
                let ack = DoipFrame::new(payload_type::DIAGNOSTIC_MESSAGE_ACK, ack_payload);

                let uds = frame.user_data().to_vec();
                match uds.as_slice() {
                    [0x10, session] => {
                        write_uds_split(&mut socket, &[0x50, *session, 0x00, 0x32, 0x01, 0xF4])
                            .await
                    }
                    [0x11, reset] => {
                        let mut out = ack.encode();
                        out.extend_from_slice(&uds_frame(&[0x51, *reset]));
                        socket.write_all(&out).await.unwrap();
                    }
                    [0x22, 0xF1, 0x90] => {
                        // Acknowledgement, two pending and the answer in one segment
                        let mut out = ack.encode();
                        out.extend_from_slice(&uds_frame(&[0x7F, 0x22, 0x78]));
                        out.extend_from_slice(&uds_frame(&[0x7F, 0x22, 0x78]));
                        let mut response = vec![0x62, 0xF1, 0x90];
                        response.extend_from_slice(VIN);
                        out.extend_from_slice(&uds_frame(&response));
                        socket.write_all(&out).await.unwrap();
                    }
                    // Routine control: the ECU drops the connection instead of answering
                    [0x31, ..] => return,
                    [0x27, 0x01] => {
                        let mut response = vec![0x67, 0x01];
                        response.extend_from_slice(&SEED);
                        write_uds(&mut socket, &response).await;
                    }
                    [0x27, 0x02, key @ ..] if key == VALID_KEY => {
                        write_uds(&mut socket, &[0x67, 0x02]).await
                    }
                    [0x27, 0x02, ..] => write_uds(&mut socket, &[0x7F, 0x27, 0x35]).await,
                    // Suppressed tester present and silent clear: no reply
                    [0x3E, 0x80] | [0x14, ..] => {}
                    [sid, ..] => write_uds(&mut socket, &[0x7F, *sid, 0x11]).await,
                    [] => {}
                }
            }
            _ => {}
        }
    }
}

fn manager(constant: u32) -> ClientManager {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("ecudiag_uds=debug")
        .with_test_writer()
        .try_init();
    ClientManager::new(SecurityConfig { constant })
}

#[tokio::test]
async fn test_diagnostic_workflow() {
    let ecu = FakeEcu::start(false).await;
    let mut manager = manager(0xE455);

    let result = manager.connect(ecu.config()).await;
    assert!(result.success, "{}", result.message);
    assert!(manager.connection_status());

    let result = manager.send_command("10", "10 03").await;
    assert!(result.success, "{}", result.message);
    assert_eq!(result.data, Some(vec![0x50, 0x03, 0x00, 0x32, 0x01, 0xF4]));

    let result = manager.send_command("22", "22 F1 90").await;
    assert!(result.success, "{}", result.message);
    assert_eq!(result.message, "Read DID 0xF190: WDB2030461A123456");

    let result = manager.send_command("27", "27 01").await;
    assert!(result.success, "{}", result.message);
    assert_eq!(result.data, Some(SEED.to_vec()));

    let result = manager.send_command("27", "27 02").await;
    assert!(result.success, "{}", result.message);

    let result = manager.send_command("3E", "3E 80").await;
    assert!(result.success);
    assert_eq!(result.data, None);

    let result = manager.send_command("11", "").await;
    assert_eq!(result.data, Some(vec![0x51, 0x01]));

    let result = manager.send_command("85", "85 01").await;
    assert_eq!(result.error, Some(ErrorKind::NegativeResponse));
    assert!(manager.connection_status());

    assert!(manager.disconnect().await.success);
    assert!(!manager.connection_status());
}

#[tokio::test]
async fn test_wrong_constant_is_rejected_by_ecu() {
    let ecu = FakeEcu::start(false).await;
    let mut manager = manager(0x1234);
    assert!(manager.connect(ecu.config()).await.success);

    assert!(manager.send_command("27", "27 01").await.success);
    let result = manager.send_command("27", "27 02").await;
    assert!(!result.success);
    assert_eq!(result.error, Some(ErrorKind::NegativeResponse));
    assert!(result.message.contains("invalid key"), "{}", result.message);

    // Constant supplied with the command
    let result = manager.send_command("27", "27 02 00 00 E4 55").await;
    assert!(result.success, "{}", result.message);
}

#[tokio::test]
async fn test_silent_ecu_times_out_without_dropping_session() {
    let ecu = FakeEcu::start(false).await;
    let mut manager = manager(0xE455);
    let config = ecu.config().with_timeout(Duration::from_millis(150));
    assert!(manager.connect(config).await.success);

    let result = manager.send_command("14", "").await;
    assert_eq!(result.error, Some(ErrorKind::ReceiveTimeout));
    assert!(manager.connection_status());

    let result = manager.send_command("11", "11 01").await;
    assert!(result.success, "{}", result.message);
}

#[tokio::test]
async fn test_session_over_tcp_transport() {
    let ecu = FakeEcu::start(false).await;
    let config = ecu.config();
    let mut session = UdsSession::new(create_transport(&config), &config);

    assert_ok!(session.open().await);
    assert!(session.routing_activated());

    let value = assert_ok!(session.read_data_by_identifier(0xF190).await);
    assert_eq!(value.data, VIN.to_vec());

    let seed = assert_ok!(session.security_access_get_seed(0x01).await);
    assert_eq!(seed, u32::from_be_bytes(SEED));
    assert_ok!(session.security_access_compare_key(0x02, 0xE455).await);

    session.close().await;
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_dropped_connection_closes_session() {
    let ecu = FakeEcu::start(false).await;
    let config = ecu.config();
    let mut session = UdsSession::new(create_transport(&config), &config);
    assert_ok!(session.open().await);

    let err = session
        .execute(&ServiceRequest::new(0x31, [0x01, 0xFF, 0x00]))
        .await
        .unwrap_err();
    assert!(err.is_fatal(), "{:?}", err);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_routing_denied() {
    let ecu = FakeEcu::start(true).await;
    let mut manager = manager(0xE455);

    let result = manager.connect(ecu.config()).await;
    assert!(!result.success);
    assert_eq!(result.error, Some(ErrorKind::RoutingActivationDenied));
    assert!(!manager.connection_status());
    assert_eq!(manager.connection_config(), None);
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut manager = manager(0xE455);
    let config = ConnectionConfig::new("127.0.0.1", SERVER).with_port(port);
    let result = manager.connect(config).await;
    assert_eq!(result.error, Some(ErrorKind::ConnectionRefused));
}
