use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SerialSettings {
    /// Device path, or "auto" to scan for the button panel, or "none" to
    /// run without a panel (on-screen input only).
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    /// Minimum interval before an identical token is accepted again.
    pub debounce_ms: u64,
    pub watchdog_interval_secs: u64,
    /// Reconnect attempts are rate-limited to avoid hammering the device.
    pub reconnect_throttle_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "auto".into(),
            baud_rate: 115_200,
            read_timeout_ms: 100,
            debounce_ms: 200,
            watchdog_interval_secs: 3,
            reconnect_throttle_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizSettings {
    pub question_count: usize,
    pub time_limit_seconds: u32,
    /// Accepted submits within this window of the previous one are dropped;
    /// the hardware buttons double-fire.
    pub submit_cooldown_ms: u64,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            question_count: 5,
            time_limit_seconds: 60,
            submit_cooldown_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KioskSettings {
    pub serial: SerialSettings,
    pub quiz: QuizSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<KioskSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            KioskSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn kiosk(&self) -> KioskSettings {
        self.data.read().unwrap().clone()
    }

    pub fn serial(&self) -> SerialSettings {
        self.data.read().unwrap().serial.clone()
    }

    pub fn quiz(&self) -> QuizSettings {
        self.data.read().unwrap().quiz.clone()
    }

    pub fn update_serial(&self, settings: SerialSettings) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            guard.serial = settings;
            self.persist(&guard)?;
        }
        Ok(())
    }

    pub fn update_quiz(&self, settings: QuizSettings) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            guard.quiz = settings;
            self.persist(&guard)?;
        }
        Ok(())
    }

    fn persist(&self, data: &KioskSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

impl SettingsStore {
    #[allow(dead_code)]
    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: KioskSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap();
        *guard = data;
        Ok(())
    }
}
