//! Persisted device settings.
//!
//! Only two values survive a reboot: the mixer's last address octet and the
//! diagnostic serial flag.

use core::fmt;

use crate::link::DEFAULT_DESTINATION_OCTET;

/// Storage key for the mixer's last address octet.
pub const KEY_DESTINATION_OCTET: &str = "ipLastDigits";
/// Storage key for the diagnostic serial flag.
pub const KEY_DIAGNOSTIC_SERIAL: &str = "usbSerial";

/// Non-volatile key/value storage.
///
/// # Errors
///
/// Every method reports the backend's failure as `Self::Error`.
#[allow(clippy::missing_errors_doc)]
pub trait KeyValueStore {
    type Error;

    fn get_u8(&mut self, key: &str) -> Result<Option<u8>, Self::Error>;
    fn put_u8(&mut self, key: &str, value: u8) -> Result<(), Self::Error>;
    fn get_bool(&mut self, key: &str) -> Result<Option<bool>, Self::Error>;
    fn put_bool(&mut self, key: &str, value: bool) -> Result<(), Self::Error>;
}

/// Storage failure tagged with the key involved.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SettingsError<E> {
    pub key: &'static str,
    pub error: E,
}

impl<E: fmt::Debug> fmt::Display for SettingsError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "settings key {}: {:?}", self.key, self.error)
    }
}

/// Values read at boot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DeviceSettings {
    pub destination_octet: u8,
    pub diagnostic_serial: bool,
}

impl DeviceSettings {
    pub const DEFAULT: Self = Self {
        destination_octet: DEFAULT_DESTINATION_OCTET,
        diagnostic_serial: true,
    };

    /// Reads both values, falling back to defaults for missing or invalid entries.
    ///
    /// # Errors
    ///
    /// Returns the first storage error encountered.
    pub fn load<S>(store: &mut S) -> Result<Self, SettingsError<S::Error>>
    where
        S: KeyValueStore,
    {
        let destination_octet = store
            .get_u8(KEY_DESTINATION_OCTET)
            .map_err(|error| SettingsError {
                key: KEY_DESTINATION_OCTET,
                error,
            })?
            .filter(|octet| (1..=254).contains(octet))
            .unwrap_or(Self::DEFAULT.destination_octet);
        let diagnostic_serial = store
            .get_bool(KEY_DIAGNOSTIC_SERIAL)
            .map_err(|error| SettingsError {
                key: KEY_DIAGNOSTIC_SERIAL,
                error,
            })?
            .unwrap_or(Self::DEFAULT.diagnostic_serial);

        Ok(Self {
            destination_octet,
            diagnostic_serial,
        })
    }

    /// Persists a confirmed destination octet.
    ///
    /// # Errors
    ///
    /// Propagates the storage error.
    pub fn save_destination<S>(
        &mut self,
        store: &mut S,
        octet: u8,
    ) -> Result<(), SettingsError<S::Error>>
    where
        S: KeyValueStore,
    {
        store
            .put_u8(KEY_DESTINATION_OCTET, octet)
            .map_err(|error| SettingsError {
                key: KEY_DESTINATION_OCTET,
                error,
            })?;
        self.destination_octet = octet;
        Ok(())
    }

    /// Persists the diagnostic serial flag.
    ///
    /// # Errors
    ///
    /// Propagates the storage error.
    pub fn save_diagnostic_serial<S>(
        &mut self,
        store: &mut S,
        enabled: bool,
    ) -> Result<(), SettingsError<S::Error>>
    where
        S: KeyValueStore,
    {
        store
            .put_bool(KEY_DIAGNOSTIC_SERIAL, enabled)
            .map_err(|error| SettingsError {
                key: KEY_DIAGNOSTIC_SERIAL,
                error,
            })?;
        self.diagnostic_serial = enabled;
        Ok(())
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}
