//! Connection lifecycle and command dispatch

use tracing::{info, warn};

use super::DiagnosticResult;
use crate::codec::{hex_to_bytes, u32_from_be_bytes};
use crate::config::{ConnectionConfig, SecurityConfig};
use crate::error::ErrorKind;
use crate::transport::{create_transport, Transport, TransportError};
use crate::uds::{
    communication_control, dtc_group, dtc_setting, dtc_status_mask, dtc_sub_function, reset_type,
    service_id, session_type, UdsError, UdsSession, SUPPRESS_POSITIVE_RESPONSE,
};

/// Builds the transport for a new connection
pub type TransportFactory = Box<dyn Fn(&ConnectionConfig) -> Box<dyn Transport> + Send + Sync>;

/// Owns at most one [`UdsSession`] and maps hex commands onto it
///
/// Every operation returns a [`DiagnosticResult`]; no error crosses this
/// boundary.
pub struct ClientManager {
    security: SecurityConfig,
    transport_factory: TransportFactory,
    session: Option<UdsSession>,
    config: Option<ConnectionConfig>,
}

/// Outcome of a dispatched service before it becomes a result
struct Outcome {
    message: String,
    data: Option<Vec<u8>>,
}

impl Outcome {
    fn new(message: impl Into<String>, data: Option<Vec<u8>>) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

impl ClientManager {
    pub fn new(security: SecurityConfig) -> Self {
        Self::with_transport_factory(security, Box::new(create_transport))
    }

    /// Use a custom transport, e.g. a [`MockTransport`](crate::MockTransport)
    pub fn with_transport_factory(
        security: SecurityConfig,
        transport_factory: TransportFactory,
    ) -> Self {
        Self {
            security,
            transport_factory,
            session: None,
            config: None,
        }
    }

    pub fn security(&self) -> &SecurityConfig {
        &self.security
    }

    /// Open a session and activate routing
    ///
    /// Rejected while a session is already active.
    pub async fn connect(&mut self, config: ConnectionConfig) -> DiagnosticResult {
        if self.session.is_some() {
            return DiagnosticResult::failure(
                ErrorKind::AlreadyConnected,
                "Already connected, disconnect first",
            );
        }
        if let Err(e) = config.validate() {
            return DiagnosticResult::from_error("Invalid connection config", &e);
        }

        let transport = (self.transport_factory)(&config);
        let mut session = UdsSession::new(transport, &config);
        match session.open().await {
            Ok(()) => {
                info!(endpoint = %config.endpoint(), "ECU connected");
                let message = format!(
                    "Connected to ECU 0x{:04X} at {}",
                    config.server_address,
                    config.endpoint()
                );
                self.session = Some(session);
                self.config = Some(config);
                DiagnosticResult::ok(message)
            }
            Err(e) => {
                warn!(endpoint = %config.endpoint(), %e, "ECU connection failed");
                DiagnosticResult::from_error("Failed to connect to ECU", &e)
            }
        }
    }

    /// Close the session; succeeds when none is open
    pub async fn disconnect(&mut self) -> DiagnosticResult {
        if let Some(mut session) = self.session.take() {
            session.close().await;
            info!("ECU disconnected");
        }
        self.config = None;
        DiagnosticResult::ok("Disconnected from ECU")
    }

    pub fn connection_status(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.routing_activated())
    }

    pub fn connection_config(&self) -> Option<&ConnectionConfig> {
        self.config.as_ref()
    }

    /// Execute one UDS command
    ///
    /// `service_id` is a hex byte (`"22"` or `"0x22"`). `data` is the full
    /// request starting with the service byte (`"22 F1 90"`); an empty string
    /// selects the service's default parameters.
    pub async fn send_command(&mut self, service_id: &str, data: &str) -> DiagnosticResult {
        let Some(session) = self.session.as_mut() else {
            return DiagnosticResult::from_error(
                "Not connected to ECU",
                &TransportError::NotConnected.into(),
            );
        };

        let (sid, params) = match parse_command(service_id, data) {
            Ok(parsed) => parsed,
            Err(e) => return DiagnosticResult::from_error("Invalid command", &e),
        };

        match dispatch(session, &self.security, sid, &params).await {
            Ok(outcome) => DiagnosticResult::ok(outcome.message).with_data(outcome.data),
            Err(e) => {
                if e.is_fatal() {
                    warn!(%e, "Session lost, disconnecting");
                    if let Some(mut session) = self.session.take() {
                        session.close().await;
                    }
                    self.config = None;
                }
                DiagnosticResult::from_error(&format!("Service 0x{:02X} failed", sid), &e)
            }
        }
    }
}

/// Split a command into service id and the parameters after it
fn parse_command(service_id: &str, data: &str) -> Result<(u8, Vec<u8>), UdsError> {
    let trimmed = service_id.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let sid = u8::from_str_radix(digits, 16)
        .map_err(|_| UdsError::MalformedRequest(format!("invalid service id '{}'", service_id)))?;

    let bytes = hex_to_bytes(data)
        .map_err(|e| UdsError::MalformedRequest(format!("invalid hex data '{}': {}", data, e)))?;

    match bytes.split_first() {
        None => Ok((sid, Vec::new())),
        Some((first, rest)) if *first == sid => Ok((sid, rest.to_vec())),
        Some((first, _)) => Err(UdsError::MalformedRequest(format!(
            "data starts with 0x{:02X}, expected service 0x{:02X}",
            first, sid
        ))),
    }
}

fn require(params: &[u8], len: usize, what: &str) -> Result<(), UdsError> {
    if params.len() < len {
        return Err(UdsError::MalformedRequest(format!(
            "{} needs {} byte(s), got {}",
            what,
            len,
            params.len()
        )));
    }
    Ok(())
}

fn did_from(params: &[u8]) -> u16 {
    u16::from_be_bytes([params[0], params[1]])
}

async fn dispatch(
    session: &mut UdsSession,
    security: &SecurityConfig,
    sid: u8,
    params: &[u8],
) -> Result<Outcome, UdsError> {
    let first = params.first().copied();

    match sid {
        service_id::DIAGNOSTIC_SESSION_CONTROL => {
            let requested = first.unwrap_or(session_type::DEFAULT);
            let response = session.start_session(requested).await?;
            Ok(Outcome::new(
                format!("Session control 0x{:02X} succeeded", requested),
                response,
            ))
        }
        service_id::ECU_RESET => {
            let reset = first.unwrap_or(reset_type::HARD_RESET);
            let response = session.ecu_reset(reset).await?;
            Ok(Outcome::new(
                format!("ECU reset 0x{:02X} succeeded", reset),
                Some(response),
            ))
        }
        service_id::CLEAR_DIAGNOSTIC_INFORMATION => {
            let group = if params.is_empty() {
                dtc_group::ALL
            } else {
                require(params, 3, "DTC group")?;
                u32::from_be_bytes([0, params[0], params[1], params[2]])
            };
            let response = session.clear_diagnostic_information(group).await?;
            Ok(Outcome::new(
                format!("Cleared diagnostic information 0x{:06X}", group),
                Some(response),
            ))
        }
        service_id::READ_DTC_INFORMATION => {
            let sub_function = first.unwrap_or(dtc_sub_function::REPORT_DTC_BY_STATUS_MASK);
            let mask = params.get(1).copied().unwrap_or(dtc_status_mask::DEFAULT);
            let response = session.read_dtc_information(sub_function, mask).await?;
            Ok(Outcome::new(
                format!("Read DTC information 0x{:02X}", sub_function),
                Some(response),
            ))
        }
        service_id::READ_DATA_BY_IDENTIFIER => {
            require(params, 2, "Data identifier")?;
            let value = session.read_data_by_identifier(did_from(params)).await?;
            Ok(Outcome::new(
                format!("Read DID 0x{:04X}: {}", value.did, value.text),
                Some(value.raw),
            ))
        }
        service_id::SECURITY_ACCESS => {
            require(params, 1, "Security access level")?;
            let level = params[0];
            if level % 2 == 1 {
                let seed = session.security_access_get_seed(level).await?;
                return Ok(Outcome::new(
                    format!("Security seed 0x{:08X} for level 0x{:02X}", seed, level),
                    Some(seed.to_be_bytes().to_vec()),
                ));
            }

            let constant = match &params[1..] {
                [] => security.constant,
                constant => u32_from_be_bytes(constant).ok_or_else(|| {
                    UdsError::MalformedRequest(format!(
                        "key constant must be 4 bytes, got {}",
                        constant.len()
                    ))
                })?,
            };
            let response = session.security_access_compare_key(level, constant).await?;
            Ok(Outcome::new(
                format!("Security access level 0x{:02X} unlocked", level),
                Some(response),
            ))
        }
        service_id::COMMUNICATION_CONTROL => {
            let control_type = first.unwrap_or(communication_control::ENABLE_RX_AND_TX);
            let response = session.communication_control(control_type).await?;
            Ok(Outcome::new(
                format!("Communication control 0x{:02X} succeeded", control_type),
                response,
            ))
        }
        service_id::WRITE_DATA_BY_IDENTIFIER => {
            require(params, 2, "Data identifier")?;
            let did = did_from(params);
            let response = session.write_data_by_identifier(did, &params[2..]).await?;
            Ok(Outcome::new(
                format!("Wrote DID 0x{:04X}", did),
                Some(response),
            ))
        }
        service_id::TESTER_PRESENT => {
            let suppress = first == Some(SUPPRESS_POSITIVE_RESPONSE);
            let response = session.tester_present(suppress).await?;
            Ok(Outcome::new("Tester present succeeded", response))
        }
        service_id::CONTROL_DTC_SETTING => {
            let setting = first.unwrap_or(dtc_setting::OFF);
            let response = session.control_dtc_setting(setting).await?;
            Ok(Outcome::new(
                format!("Control DTC setting 0x{:02X} succeeded", setting),
                Some(response),
            ))
        }
        other => Err(UdsError::UnsupportedService(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{payload_type, DoipFrame};
    use crate::transport::MockTransport;
    use pretty_assertions::assert_eq;

    const CLIENT: u16 = 0x0E80;
    const SERVER: u16 = 0x1001;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("ecu.local", SERVER)
    }

    fn manager_with(mock: &MockTransport) -> ClientManager {
        let mock = mock.clone();
        ClientManager::with_transport_factory(
            SecurityConfig { constant: 0xE455 },
            Box::new(move |_: &ConnectionConfig| -> Box<dyn Transport> {
                Box::new(mock.clone())
            }),
        )
    }

    async fn connected() -> (ClientManager, MockTransport) {
        let mock = MockTransport::new();
        mock.push_routing_activation(CLIENT, SERVER);
        let mut manager = manager_with(&mock);
        assert!(manager.connect(config()).await.success);
        (manager, mock)
    }

    fn last_sent_uds(mock: &MockTransport) -> Vec<u8> {
        let frames = mock.sent_frames();
        DoipFrame::decode(frames.last().unwrap())
            .unwrap()
            .user_data()
            .to_vec()
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("22", "22 F1 90").unwrap(), (0x22, vec![0xF1, 0x90]));
        assert_eq!(parse_command("0x10", "").unwrap(), (0x10, vec![]));
        assert!(matches!(
            parse_command("22", "10 01"),
            Err(UdsError::MalformedRequest(_))
        ));
        assert!(matches!(parse_command("zz", ""), Err(UdsError::MalformedRequest(_))));
        assert!(matches!(parse_command("22", "2"), Err(UdsError::MalformedRequest(_))));
    }

    #[tokio::test]
    async fn test_connect_lifecycle() {
        let (mut manager, _mock) = connected().await;
        assert!(manager.connection_status());
        assert_eq!(manager.connection_config(), Some(&config()));

        let again = manager.connect(config()).await;
        assert!(!again.success);
        assert_eq!(again.error, Some(ErrorKind::AlreadyConnected));

        assert!(manager.disconnect().await.success);
        assert!(!manager.connection_status());
        assert_eq!(manager.connection_config(), None);
        assert!(manager.disconnect().await.success);
    }

    #[tokio::test]
    async fn test_routing_denied_is_reported() {
        let mock = MockTransport::new();
        mock.push_frame(
            DoipFrame::new(
                payload_type::ROUTING_ACTIVATION_RESPONSE,
                vec![0x0E, 0x80, 0x10, 0x01, 0x00, 0, 0, 0, 0],
            )
            .encode(),
        );
        let mut manager = manager_with(&mock);

        let result = manager.connect(config()).await;
        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::RoutingActivationDenied));
        assert!(!manager.connection_status());
        assert_eq!(manager.connection_config(), None);
        assert!(!mock.is_connected());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let mock = MockTransport::new();
        mock.fail_connect(TransportError::ConnectionRefused("refused".into()));
        let mut manager = manager_with(&mock);

        let result = manager.connect(config()).await;
        assert_eq!(result.error, Some(ErrorKind::ConnectionRefused));
    }

    #[tokio::test]
    async fn test_command_without_connection() {
        let mut manager = manager_with(&MockTransport::new());
        let result = manager.send_command("10", "10 03").await;
        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::NotConnected));
    }

    #[tokio::test]
    async fn test_defaults_for_empty_data() {
        let (mut manager, mock) = connected().await;

        mock.push_uds_response(SERVER, CLIENT, &[0x59, 0x02, 0xFF]);
        let result = manager.send_command("19", "").await;
        assert!(result.success);
        assert_eq!(result.data, Some(vec![0x59, 0x02, 0xFF]));
        assert_eq!(last_sent_uds(&mock), vec![0x19, 0x02, 0xAF]);

        mock.push_uds_response(SERVER, CLIENT, &[0x54]);
        assert!(manager.send_command("14", "").await.success);
        assert_eq!(last_sent_uds(&mock), vec![0x14, 0xFF, 0xFF, 0xFF]);

        mock.push_uds_response(SERVER, CLIENT, &[0xC5, 0x02]);
        assert!(manager.send_command("85", "").await.success);
        assert_eq!(last_sent_uds(&mock), vec![0x85, 0x02]);

        mock.push_uds_response(SERVER, CLIENT, &[0x68, 0x00]);
        assert!(manager.send_command("28", "").await.success);
        assert_eq!(last_sent_uds(&mock), vec![0x28, 0x00, 0x03]);
    }

    #[tokio::test]
    async fn test_security_access_via_commands() {
        let (mut manager, mock) = connected().await;

        let result = manager.send_command("27", "27 02").await;
        assert_eq!(result.error, Some(ErrorKind::NoSeedAvailable));
        assert!(manager.connection_status());

        mock.push_uds_response(SERVER, CLIENT, &[0x67, 0x01, 0xB4, 0x18, 0xE1, 0xA8]);
        let result = manager.send_command("27", "27 01").await;
        assert!(result.success);
        assert_eq!(result.data, Some(vec![0xB4, 0x18, 0xE1, 0xA8]));

        mock.push_uds_response(SERVER, CLIENT, &[0x67, 0x02]);
        assert!(manager.send_command("27", "27 02").await.success);
        assert_eq!(last_sent_uds(&mock), vec![0x27, 0x02, 0xBD, 0xBD, 0xB0, 0x90]);

        // Explicit constant overrides the configured one
        mock.push_uds_response(SERVER, CLIENT, &[0x67, 0x02]);
        assert!(manager.send_command("27", "27 02 00 00 12 34").await.success);
        let expected = crate::security::level1(0xB418_E1A8, 0x1234).to_be_bytes();
        assert_eq!(last_sent_uds(&mock)[2..], expected);

        let result = manager.send_command("27", "27 0A").await;
        assert_eq!(result.error, Some(ErrorKind::UnsupportedSecurityLevel));
    }

    #[tokio::test]
    async fn test_read_did_message_has_text() {
        let (mut manager, mock) = connected().await;
        mock.push_uds_response(SERVER, CLIENT, &[0x62, 0xF1, 0x90, b'W', b'D', b'B']);

        let result = manager.send_command("22", "22 F1 90").await;
        assert!(result.success);
        assert_eq!(result.message, "Read DID 0xF190: WDB");
        assert_eq!(result.data_hex(), "62 f1 90 57 44 42");
    }

    #[tokio::test]
    async fn test_malformed_and_unsupported() {
        let (mut manager, mock) = connected().await;
        let sent_before = mock.sent_frames().len();

        assert_eq!(
            manager.send_command("22", "22 F1").await.error,
            Some(ErrorKind::MalformedRequest)
        );
        assert_eq!(
            manager.send_command("31", "31 01 FF 00").await.error,
            Some(ErrorKind::UnsupportedService)
        );
        assert_eq!(mock.sent_frames().len(), sent_before);
    }

    #[tokio::test]
    async fn test_negative_response_keeps_session() {
        let (mut manager, mock) = connected().await;
        mock.push_uds_response(SERVER, CLIENT, &[0x7F, 0x11, 0x22]);

        let result = manager.send_command("11", "11 01").await;
        assert_eq!(result.error, Some(ErrorKind::NegativeResponse));
        assert!(result.message.contains("conditions not correct"));
        assert!(manager.connection_status());
    }

    #[tokio::test]
    async fn test_fatal_error_drops_session() {
        let (mut manager, mock) = connected().await;
        mock.push_error(TransportError::Io("connection reset".into()));

        let result = manager.send_command("11", "").await;
        assert_eq!(result.error, Some(ErrorKind::TransportError));
        assert!(!manager.connection_status());
        assert_eq!(manager.connection_config(), None);
    }

    #[tokio::test]
    async fn test_fire_and_forget_has_no_data() {
        let (mut manager, mock) = connected().await;
        let calls_before = mock.receive_calls();

        let result = manager.send_command("3E", "3E 80").await;
        assert!(result.success);
        assert_eq!(result.data, None);
        assert_eq!(mock.receive_calls(), calls_before);
    }
}
