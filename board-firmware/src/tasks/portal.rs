// Provisioning-Portal: HTTP-Formular + DHCP-Server im Access-Point-Netz
use alloc::string::String;
use core::future::pending;
use core::net::Ipv4Addr;

use board_core::Credential;
use defmt::{Debug2Format, info, warn};
use edge_dhcp::server::{Server as DhcpServer, ServerOptions as DhcpServerOptions};
use edge_dhcp::{Options as DhcpOptions, Packet as DhcpPacket};
use embassy_futures::select::{Either, select};
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{Ipv4Address, Stack};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer, with_timeout};
use picoserve::extract::Form;
use picoserve::response::{IntoResponse, Response, StatusCode};
use picoserve::routing::get;
use serde::Deserialize;

use crate::config::{AP_ADDRESS, HTTP_BUFFER_SIZE, TCP_RX_BUFFER_SIZE, TCP_TX_BUFFER_SIZE};

/// Vom Formular eingegebene Zugangsdaten
static PROVISIONED: Signal<CriticalSectionRawMutex, Credential> = Signal::new();

/// Zeit, in der die Bestätigungsseite noch ausgeliefert wird
const CONFIRM_GRACE_MS: u64 = 500;

const PORTAL_HTML: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
<meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\
<title>Lernboard WLAN</title></head><body>\
<h1>WLAN einrichten</h1>\
<form method=\"post\" action=\"/\">\
<p><label>Netzwerk (SSID)<br><input name=\"ssid\" maxlength=\"32\" required></label></p>\
<p><label>Passwort<br><input name=\"password\" type=\"password\" maxlength=\"64\"></label></p>\
<p><button type=\"submit\">Speichern</button></p>\
</form></body></html>";

const SAVED_HTML: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head><body>\
<h1>Gespeichert</h1><p>Das Board verbindet sich jetzt mit dem Netzwerk.</p></body></html>";

#[derive(Deserialize)]
struct PortalForm {
    ssid: String,
    password: String,
}

/// Betreibt Portal und DHCP bis Zugangsdaten eintreffen oder `timeout` abläuft
pub async fn run_portal(stack: Stack<'static>, timeout: Duration) -> Option<Credential> {
    PROVISIONED.reset();

    let app = picoserve::Router::new().route("/", get(serve_form).post(save_credentials));

    let config = picoserve::Config::new(picoserve::Timeouts {
        start_read_request: Some(Duration::from_secs(5)),
        read_request: Some(Duration::from_secs(1)),
        write: Some(Duration::from_secs(1)),
        persistent_start_read_request: Some(Duration::from_secs(1)),
    });

    let mut http_buffer = [0u8; HTTP_BUFFER_SIZE];
    let mut rx_buffer = [0u8; TCP_RX_BUFFER_SIZE];
    let mut tx_buffer = [0u8; TCP_TX_BUFFER_SIZE];
    let server = picoserve::Server::new(&app, &config, &mut http_buffer);

    let [a, b, c, d] = AP_ADDRESS;
    info!("PORTAL: Waiting for credentials on http://{}.{}.{}.{}/", a, b, c, d);

    let serving = select(
        server.listen_and_serve(0, stack, 80, &mut rx_buffer, &mut tx_buffer),
        dhcp_server(stack),
    );
    let waiting = async {
        let result = with_timeout(timeout, PROVISIONED.wait()).await;
        if result.is_ok() {
            Timer::after(Duration::from_millis(CONFIRM_GRACE_MS)).await;
        }
        result
    };

    match select(serving, waiting).await {
        Either::Second(Ok(credential)) => Some(credential),
        Either::Second(Err(_)) => {
            warn!("PORTAL: Timeout, no credentials received");
            None
        }
        Either::First(_) => {
            warn!("PORTAL: Server stopped");
            None
        }
    }
}

async fn serve_form() -> impl IntoResponse {
    Response::new(StatusCode::OK, PORTAL_HTML).with_header("Content-Type", "text/html; charset=utf-8")
}

async fn save_credentials(Form(form): Form<PortalForm>) -> impl IntoResponse {
    match Credential::new(form.ssid.trim(), &form.password) {
        Some(credential) => {
            info!("PORTAL: Received credentials for '{}'", credential.ssid.as_str());
            PROVISIONED.signal(credential);
            Response::new(StatusCode::OK, SAVED_HTML).with_header("Content-Type", "text/html; charset=utf-8")
        }
        None => Response::new(StatusCode::new(400), "Ungültige Zugangsdaten")
            .with_header("Content-Type", "text/plain; charset=utf-8"),
    }
}

/// Vergibt Adressen an Clients im Portal-Netz
async fn dhcp_server(stack: Stack<'static>) {
    while !stack.is_config_up() {
        Timer::after(Duration::from_millis(100)).await;
    }

    let mut rx_meta = [PacketMetadata::EMPTY; 2];
    let mut rx_buffer = [0u8; 600];
    let mut tx_meta = [PacketMetadata::EMPTY; 2];
    let mut tx_buffer = [0u8; 600];

    let mut socket = UdpSocket::new(stack, &mut rx_meta, &mut rx_buffer, &mut tx_meta, &mut tx_buffer);
    if let Err(e) = socket.bind(67) {
        warn!("PORTAL: DHCP bind failed: {}", Debug2Format(&e));
        return pending().await;
    }

    let [a, b, c, d] = AP_ADDRESS;
    let server_ip = Ipv4Addr::new(a, b, c, d);
    let mut gw_buf = [Ipv4Addr::UNSPECIFIED; 1];
    let server_options = DhcpServerOptions::new(server_ip, Some(&mut gw_buf));

    let mut server = DhcpServer::<_, 8>::new_with_et(server_ip);
    server.range_start = Ipv4Addr::new(a, b, c, 50);
    server.range_end = Ipv4Addr::new(a, b, c, 200);

    let mut buf = [0u8; 600];
    let mut out = [0u8; 600];
    loop {
        let (len, _meta) = match socket.recv_from(&mut buf).await {
            Ok(result) => result,
            Err(_) => continue,
        };

        let request = match DhcpPacket::decode(&buf[..len]) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("PORTAL: DHCP decode error: {}", Debug2Format(&e));
                continue;
            }
        };

        let mut opt_buf = DhcpOptions::buf();
        if let Some(reply) = server.handle_request(&mut opt_buf, &server_options, &request) {
            match reply.encode(&mut out) {
                Ok(encoded) => {
                    let broadcast = (Ipv4Address::new(255, 255, 255, 255), 68);
                    if let Err(e) = socket.send_to(encoded, broadcast).await {
                        warn!("PORTAL: DHCP send error: {}", Debug2Format(&e));
                    }
                }
                Err(e) => warn!("PORTAL: DHCP encode error: {}", Debug2Format(&e)),
            }
        }
    }
}
