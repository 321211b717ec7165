use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Settings {
    /// API region host suffix, e.g. `mypurecloud.com` or `mypurecloud.de`.
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub deployment_id: String,
    #[serde(default = "default_target_type")]
    pub target_type: String,
    #[serde(default = "default_target_address")]
    pub target_address: String,
    #[serde(default = "default_display_name")]
    pub display_name: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub avatar_image_url: Option<String>,
    #[serde(default = "default_true")]
    pub mic_enabled_on_join: bool,
    #[serde(default)]
    pub camera_enabled_on_join: bool,
}

fn default_environment() -> String {
    "mypurecloud.com".to_string()
}

fn default_target_type() -> String {
    "queue".to_string()
}

fn default_target_address() -> String {
    "AppFoundry".to_string()
}

fn default_display_name() -> String {
    "Bender Bending Rodriguez".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            organization_id: String::new(),
            deployment_id: String::new(),
            target_type: default_target_type(),
            target_address: default_target_address(),
            display_name: default_display_name(),
            first_name: Some("Bender".to_string()),
            last_name: Some("Rodriguez".to_string()),
            email: Some("bender.bending.rodriguez@example.com".to_string()),
            phone_number: Some("+66 666666".to_string()),
            avatar_image_url: None,
            mic_enabled_on_join: true,
            camera_enabled_on_join: false,
        }
    }
}

impl Settings {
    /// Base URL of the contact-center API for this environment.
    pub fn api_base(&self) -> String {
        format!("https://api.{}", self.environment)
    }
}

pub struct SettingsStore {
    settings: Mutex<Settings>,
    file_path: PathBuf,
}

impl SettingsStore {
    pub fn new(data_dir: &str) -> Self {
        let file_path = PathBuf::from(data_dir).join("settings.json");
        let settings = Self::load(&file_path);
        Self {
            settings: Mutex::new(settings),
            file_path,
        }
    }

    pub fn get(&self) -> Settings {
        self.settings.lock().unwrap().clone()
    }

    /// Replace the whole settings blob and persist it.
    pub fn replace(&self, settings: Settings) {
        *self.settings.lock().unwrap() = settings;
        self.save();
    }

    pub fn set_display_name(&self, name: String) {
        self.settings.lock().unwrap().display_name = name;
        self.save();
    }

    pub fn set_routing(&self, target_type: String, target_address: String) {
        {
            let mut settings = self.settings.lock().unwrap();
            settings.target_type = target_type;
            settings.target_address = target_address;
        }
        self.save();
    }

    pub fn set_mic_enabled_on_join(&self, enabled: bool) {
        self.settings.lock().unwrap().mic_enabled_on_join = enabled;
        self.save();
    }

    pub fn set_camera_enabled_on_join(&self, enabled: bool) {
        self.settings.lock().unwrap().camera_enabled_on_join = enabled;
        self.save();
    }

    /// Restore built-in defaults and persist them.
    pub fn reset(&self) {
        *self.settings.lock().unwrap() = Settings::default();
        self.save();
    }

    fn save(&self) {
        let settings = self.settings.lock().unwrap().clone();
        if let Some(parent) = self.file_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(&settings) {
            let _ = std::fs::write(&self.file_path, json);
        }
    }

    fn load(path: &PathBuf) -> Settings {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Settings::default(),
        }
    }
}
