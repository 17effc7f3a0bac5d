// HTTP-Update-Client: Konfiguration (POST /updateConf) und Firmware (GET /updateFW)
//
// Einfaches HTTP/1.0 über einen TCP-Socket; der Server schließt die Verbindung
// nach der Antwort, das Ende des Bodys ist das Ende des Streams.
use board_core::{ConfigRequest, FirmwareUpdate, UpdateError, UpdateService};
use defmt::{Debug2Format, error, info, warn};
use embassy_net::{Stack, tcp::TcpSocket};
use embassy_time::Duration;
use embedded_io_async::Write;
use embedded_storage::Storage as _;
use esp_bootloader_esp_idf::ota::OtaImageState;
use esp_bootloader_esp_idf::ota_updater::OtaUpdater;
use esp_bootloader_esp_idf::partitions::PARTITION_TABLE_MAX_LEN;

use crate::config::*;
use crate::hal::SharedFlash;
use crate::tasks::dns::resolve_host;

const HTTP_PORT: u16 = 80;
const USER_AGENT: &str = "ESP32-http-Update";

/// Kopf einer HTTP-Antwort
struct ResponseHead {
    status: u16,
    /// Bereits empfangene Body-Bytes hinter dem Header
    body_start: usize,
    filled: usize,
}

pub struct HttpUpdateService {
    stack: Stack<'static>,
    flash: &'static SharedFlash,
}

impl HttpUpdateService {
    pub fn new(stack: Stack<'static>, flash: &'static SharedFlash) -> Self {
        Self { stack, flash }
    }

    async fn open<'s>(
        &self,
        server: &str,
        rx_buffer: &'s mut [u8],
        tx_buffer: &'s mut [u8],
    ) -> Result<TcpSocket<'s>, UpdateError> {
        let address = resolve_host(self.stack, server).await.map_err(|e| {
            warn!("UPDATE: Resolving {} failed: {}", server, e);
            UpdateError::Connect
        })?;

        let mut socket = TcpSocket::new(self.stack, rx_buffer, tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(HTTP_TIMEOUT_SECS)));
        socket.connect((address, HTTP_PORT)).await.map_err(|e| {
            warn!("UPDATE: Connecting {} failed: {}", server, Debug2Format(&e));
            UpdateError::Connect
        })?;
        Ok(socket)
    }
}

/// Schreibt die Request-Zeile und die Geräte-Header
async fn send_request(
    socket: &mut TcpSocket<'_>,
    method: &str,
    path: &str,
    server: &str,
    request: &ConfigRequest<'_>,
    with_config: bool,
) -> Result<(), UpdateError> {
    let parts: [&str; 14] = [
        method,
        " ",
        path,
        " HTTP/1.0\r\nHost: ",
        server,
        "\r\nUser-Agent: ",
        USER_AGENT,
        "\r\nx-ESP32-STA-MAC: ",
        request.mac,
        "\r\nx-ESP32-version: ",
        request.firmware_version,
        "\r\nx-ESP32-type: ",
        request.device_type,
        "\r\nContent-Length: 0\r\n",
    ];
    for part in parts {
        socket.write_all(part.as_bytes()).await.map_err(|_| UpdateError::Io)?;
    }

    if with_config {
        // Header-Wert muss einzeilig sein
        socket.write_all(b"x-ESP32-conf: ").await.map_err(|_| UpdateError::Io)?;
        for line in request.current_config.lines() {
            socket.write_all(line.trim().as_bytes()).await.map_err(|_| UpdateError::Io)?;
        }
        socket.write_all(b"\r\n").await.map_err(|_| UpdateError::Io)?;
    }
    socket.write_all(b"\r\n").await.map_err(|_| UpdateError::Io)?;
    socket.flush().await.map_err(|_| UpdateError::Io)
}

/// Liest bis zum Ende des Headers und wertet die Statuszeile aus
async fn read_head(socket: &mut TcpSocket<'_>, buf: &mut [u8]) -> Result<ResponseHead, UpdateError> {
    let mut filled = 0;
    loop {
        if filled == buf.len() {
            return Err(UpdateError::BodyTooLarge);
        }
        let n = socket.read(&mut buf[filled..]).await.map_err(|_| UpdateError::Io)?;
        if n == 0 {
            return Err(UpdateError::Io);
        }
        filled += n;

        if let Some(end) = buf[..filled].windows(4).position(|w| w == b"\r\n\r\n") {
            let head = core::str::from_utf8(&buf[..end]).map_err(|_| UpdateError::Io)?;
            let status = parse_status(head).ok_or(UpdateError::Io)?;
            return Ok(ResponseHead {
                status,
                body_start: end + 4,
                filled,
            });
        }
    }
}

/// "HTTP/1.1 304 Not Modified" → 304
fn parse_status(head: &str) -> Option<u16> {
    let status_line = head.lines().next()?;
    let mut fields = status_line.split_whitespace();
    if !fields.next()?.starts_with("HTTP/") {
        return None;
    }
    fields.next()?.parse().ok()
}

impl UpdateService for HttpUpdateService {
    async fn fetch_config(
        &mut self,
        server: &str,
        request: &ConfigRequest<'_>,
        body: &mut [u8],
    ) -> Result<usize, UpdateError> {
        info!("UPDATE: Requesting configuration from {}", server);
        let mut rx_buffer = [0u8; TCP_RX_BUFFER_SIZE];
        let mut tx_buffer = [0u8; TCP_TX_BUFFER_SIZE];
        let mut socket = self.open(server, &mut rx_buffer, &mut tx_buffer).await?;

        send_request(&mut socket, "POST", CONFIG_UPDATE_PATH, server, request, true).await?;

        let mut head_buf = [0u8; HTTP_BUFFER_SIZE];
        let head = read_head(&mut socket, &mut head_buf).await?;
        if head.status != 200 {
            info!("UPDATE: Configuration server answered {}", head.status);
            socket.close();
            return Err(UpdateError::Status(head.status));
        }

        let initial = &head_buf[head.body_start..head.filled];
        if initial.len() > body.len() {
            return Err(UpdateError::BodyTooLarge);
        }
        body[..initial.len()].copy_from_slice(initial);
        let mut len = initial.len();

        loop {
            if len == body.len() {
                // Puffer voll: nur noch EOF ist erlaubt
                let mut extra = [0u8; 1];
                return match socket.read(&mut extra).await {
                    Ok(0) => Ok(len),
                    Ok(_) => Err(UpdateError::BodyTooLarge),
                    Err(_) => Err(UpdateError::Io),
                };
            }
            match socket.read(&mut body[len..]).await {
                Ok(0) => break,
                Ok(n) => len += n,
                Err(_) => return Err(UpdateError::Io),
            }
        }
        socket.close();
        info!("UPDATE: Received {} bytes of configuration", len);
        Ok(len)
    }

    async fn update_firmware(&mut self, server: &str, request: &ConfigRequest<'_>) -> FirmwareUpdate {
        info!("UPDATE: Checking firmware {} at {}", request.firmware_version, server);
        let mut rx_buffer = [0u8; TCP_RX_BUFFER_SIZE];
        let mut tx_buffer = [0u8; TCP_TX_BUFFER_SIZE];
        let Ok(mut socket) = self.open(server, &mut rx_buffer, &mut tx_buffer).await else {
            return FirmwareUpdate::Failed;
        };

        if send_request(&mut socket, "GET", FIRMWARE_UPDATE_PATH, server, request, false)
            .await
            .is_err()
        {
            return FirmwareUpdate::Failed;
        }

        let mut chunk = [0u8; OTA_CHUNK_SIZE];
        let head = match read_head(&mut socket, &mut chunk).await {
            Ok(head) => head,
            Err(e) => {
                warn!("UPDATE: Reading response failed: {}", e);
                return FirmwareUpdate::Failed;
            }
        };
        match head.status {
            200 => {}
            304 => {
                info!("UPDATE: Firmware is up to date");
                socket.close();
                return FirmwareUpdate::NoUpdate;
            }
            status => {
                warn!("UPDATE: Firmware server answered {}", status);
                socket.close();
                return FirmwareUpdate::Failed;
            }
        }

        // Header-Rest an den Anfang schieben, danach Chunk für Chunk flashen
        chunk.copy_within(head.body_start..head.filled, 0);
        let pending = head.filled - head.body_start;

        match write_image(self.flash, &mut socket, &mut chunk, pending).await {
            Ok(total) => {
                info!("UPDATE: Firmware written ({} bytes)", total);
                FirmwareUpdate::Updated
            }
            Err(e) => {
                error!("UPDATE: Firmware update failed: {}", e);
                FirmwareUpdate::Failed
            }
        }
    }
}

/// Streamt das Image in den nächsten OTA-Slot und aktiviert ihn
async fn write_image(
    flash: &SharedFlash,
    socket: &mut TcpSocket<'_>,
    chunk: &mut [u8; OTA_CHUNK_SIZE],
    mut pending: usize,
) -> Result<usize, UpdateError> {
    let mut flash = flash.lock().await;
    let mut table = [0u8; PARTITION_TABLE_MAX_LEN];
    let mut ota = OtaUpdater::new(&mut *flash, &mut table).map_err(|e| {
        error!("UPDATE: No OTA partitions: {}", Debug2Format(&e));
        UpdateError::Io
    })?;

    let mut written: usize = 0;
    {
        let (mut partition, _) = ota.next_partition().map_err(|_| UpdateError::Io)?;

        loop {
            // Chunk auffüllen, damit jeder Flash-Sektor nur einmal geschrieben wird
            let mut eof = false;
            while pending < chunk.len() {
                match socket.read(&mut chunk[pending..]).await {
                    Ok(0) => {
                        eof = true;
                        break;
                    }
                    Ok(n) => pending += n,
                    Err(_) => return Err(UpdateError::Io),
                }
            }

            if pending > 0 {
                partition
                    .write(written as u32, &chunk[..pending])
                    .map_err(|_| UpdateError::Io)?;
                written += pending;
                pending = 0;
            }
            if eof {
                break;
            }
        }
    }

    if written == 0 {
        return Err(UpdateError::Io);
    }
    ota.activate_next_partition().map_err(|_| UpdateError::Io)?;
    ota.set_current_ota_state(OtaImageState::New)
        .map_err(|_| UpdateError::Io)?;
    Ok(written)
}
