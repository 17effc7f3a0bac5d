// Flacher Dateispeicher in der Daten-Partition des Flash
//
// Jede Datei belegt einen festen 4-KB-Slot:
//
//   [0]        Pfadlänge (0xFF = Slot frei)
//   [1..33]    Pfad
//   [33..37]   Datenlänge (u32, little-endian)
//   [40..]     Daten

use board_core::{Storage, StorageError};
use defmt::{Debug2Format, error, info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embedded_storage::{ReadStorage, Storage as _};
use esp_storage::FlashStorage;

use crate::config::{FILE_PATH_CAPACITY, FILE_SLOT_COUNT, FILE_SLOT_SIZE};

/// Flash, geteilt zwischen Dateispeicher und OTA-Updater
pub type SharedFlash = Mutex<CriticalSectionRawMutex, FlashStorage<'static>>;

const HEADER_SIZE: usize = 40;
const PATH_OFFSET: usize = 1;
const LENGTH_OFFSET: usize = PATH_OFFSET + FILE_PATH_CAPACITY;
const EMPTY_SLOT: u8 = 0xFF;

/// Ohne gültige Daten-Partition (`region == None`) schlägt jeder Zugriff mit
/// [`StorageError::Io`] fehl; Bootloader, Partitionstabelle und App bleiben unberührt.
pub struct FlashFileStore {
    flash: &'static SharedFlash,
    region: Option<u32>,
}

struct SlotHeader {
    path_len: u8,
    path: [u8; FILE_PATH_CAPACITY],
    data_len: u32,
}

impl SlotHeader {
    fn parse(raw: &[u8; HEADER_SIZE]) -> Self {
        let mut path = [0u8; FILE_PATH_CAPACITY];
        path.copy_from_slice(&raw[PATH_OFFSET..LENGTH_OFFSET]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&raw[LENGTH_OFFSET..LENGTH_OFFSET + 4]);
        Self {
            path_len: raw[0],
            path,
            data_len: u32::from_le_bytes(len),
        }
    }

    fn encode(path: &str, data_len: u32) -> [u8; HEADER_SIZE] {
        let mut raw = [0xFFu8; HEADER_SIZE];
        raw[0] = path.len() as u8;
        raw[PATH_OFFSET..PATH_OFFSET + path.len()].copy_from_slice(path.as_bytes());
        raw[LENGTH_OFFSET..LENGTH_OFFSET + 4].copy_from_slice(&data_len.to_le_bytes());
        raw
    }

    fn is_empty(&self) -> bool {
        self.path_len == EMPTY_SLOT
    }

    fn matches(&self, path: &str) -> bool {
        let len = self.path_len as usize;
        !self.is_empty() && len <= FILE_PATH_CAPACITY && &self.path[..len] == path.as_bytes()
    }
}

/// Basis-Offset der Slots, falls die Partition alle Slots aufnehmen kann
pub fn file_region(partition: Option<(u32, u32)>) -> Option<u32> {
    let (base, len) = partition?;
    (len >= FILE_SLOT_SIZE * FILE_SLOT_COUNT).then_some(base)
}

impl FlashFileStore {
    /// `partition`: Offset und Größe der Daten-Partition aus der Partitionstabelle
    pub fn new(flash: &'static SharedFlash, partition: Option<(u32, u32)>) -> Self {
        let region = file_region(partition);
        match (partition, region) {
            (None, _) => error!("STORAGE: No data partition, files are not persisted"),
            (Some((_, len)), None) => error!(
                "STORAGE: Data partition too small ({} of {} bytes), files are not persisted",
                len,
                FILE_SLOT_SIZE * FILE_SLOT_COUNT
            ),
            (Some((base, len)), Some(_)) => info!("STORAGE: Data partition at {:#x} ({} bytes)", base, len),
        }
        Self { flash, region }
    }

    fn base(&self) -> Result<u32, StorageError> {
        self.region.ok_or(StorageError::Io)
    }

    fn slot_offset(base: u32, slot: u32) -> u32 {
        base + slot * FILE_SLOT_SIZE
    }

    fn read_header(flash: &mut FlashStorage<'static>, offset: u32) -> Result<SlotHeader, StorageError> {
        let mut raw = [0u8; HEADER_SIZE];
        flash.read(offset, &mut raw).map_err(|e| {
            warn!("STORAGE: Flash read failed: {}", Debug2Format(&e));
            StorageError::Io
        })?;
        Ok(SlotHeader::parse(&raw))
    }

    /// Slot der Datei oder (falls nicht vorhanden) der erste freie Slot
    fn find_slot(
        flash: &mut FlashStorage<'static>,
        base: u32,
        path: &str,
    ) -> Result<(Option<u32>, Option<u32>), StorageError> {
        let mut free = None;
        for slot in 0..FILE_SLOT_COUNT {
            let header = Self::read_header(flash, Self::slot_offset(base, slot))?;
            if header.matches(path) {
                return Ok((Some(slot), free));
            }
            if header.is_empty() && free.is_none() {
                free = Some(slot);
            }
        }
        Ok((None, free))
    }
}

impl Storage for FlashFileStore {
    fn read(&mut self, path: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let base = self.base()?;
        let mut flash = self.flash.try_lock().map_err(|_| StorageError::Io)?;
        let (slot, _) = Self::find_slot(&mut flash, base, path)?;
        let slot = slot.ok_or(StorageError::NotFound)?;

        let offset = Self::slot_offset(base, slot);
        let len = Self::read_header(&mut flash, offset)?.data_len as usize;
        if len > FILE_SLOT_SIZE as usize - HEADER_SIZE {
            return Err(StorageError::Io);
        }
        if len > buf.len() {
            return Err(StorageError::TooLarge);
        }
        flash
            .read(offset + HEADER_SIZE as u32, &mut buf[..len])
            .map_err(|_| StorageError::Io)?;
        Ok(len)
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        if path.is_empty() || path.len() > FILE_PATH_CAPACITY || data.len() > FILE_SLOT_SIZE as usize - HEADER_SIZE {
            return Err(StorageError::TooLarge);
        }
        let base = self.base()?;
        let mut flash = self.flash.try_lock().map_err(|_| StorageError::Io)?;
        let slot = match Self::find_slot(&mut flash, base, path)? {
            (Some(slot), _) => slot,
            (None, Some(free)) => free,
            (None, None) => {
                warn!("STORAGE: No free slot for {}", path);
                return Err(StorageError::Io);
            }
        };

        // Daten vor dem Header schreiben: ein Abbruch lässt den alten Header stehen
        let offset = Self::slot_offset(base, slot);
        flash
            .write(offset + HEADER_SIZE as u32, data)
            .map_err(|_| StorageError::Io)?;
        flash
            .write(offset, &SlotHeader::encode(path, data.len() as u32))
            .map_err(|_| StorageError::Io)
    }
}
