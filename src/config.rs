use std::path::PathBuf;
use std::env;
use std::fs;
use serde::{Deserialize, Serialize};
use crate::error::CompilerError;
use crate::lexer::GENERIC_CURRENCY;

const LOCALE_VARIABLES: [&str; 3] = ["LC_ALL", "LC_MONETARY", "LANG"];

// Territory part of a locale name to its currency sign.
const CURRENCIES: &[(&str, char)] = &[
    ("US", '$'),
    ("CA", '$'),
    ("AU", '$'),
    ("NZ", '$'),
    ("MX", '$'),
    ("GB", '£'),
    ("JP", '¥'),
    ("CN", '¥'),
    ("IN", '₹'),
    ("KR", '₩'),
    ("RU", '₽'),
    ("UA", '₴'),
    ("TR", '₺'),
    ("IL", '₪'),
    ("VN", '₫'),
    ("PH", '₱'),
    ("NG", '₦'),
    ("TH", '฿'),
    ("DE", '€'),
    ("FR", '€'),
    ("ES", '€'),
    ("IT", '€'),
    ("NL", '€'),
    ("BE", '€'),
    ("AT", '€'),
    ("IE", '€'),
    ("PT", '€'),
    ("FI", '€'),
    ("GR", '€'),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub install_dir: PathBuf,
    pub out_dir: PathBuf,
    #[serde(default)]
    pub template: Option<PathBuf>,
    pub env_name: String,
    #[serde(default)]
    pub currency_symbol: Option<char>,
    #[serde(default)]
    pub strict: bool,
}

fn env_name() -> String {
    env::var("DBC_ENV").unwrap_or_else(|_| String::from("default"))
}

fn home_dir() -> PathBuf {
    let home = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    PathBuf::from(env::var(home).unwrap_or_else(|_| String::from(".")))
}

impl Default for Config {
    fn default() -> Self {
        let env_name = env_name();
        let install_dir = home_dir().join(".dbc").join(&env_name);

        let out_dir = env::var("DBC_OUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("built"));
        let template = env::var("DBC_TEMPLATE").ok().map(PathBuf::from);

        Config {
            install_dir,
            out_dir,
            template,
            env_name,
            currency_symbol: None,
            strict: false,
        }
    }
}

impl Config {
    /// Read the config for the current environment, writing the defaults on first use.
    pub fn load() -> Result<Self, CompilerError> {
        let config_path = Self::get_config_path();
        if !config_path.exists() {
            let config = Config::default();
            config.save()?;
            return Ok(config);
        }

        let contents = fs::read_to_string(&config_path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self) -> Result<(), CompilerError> {
        let config_path = Self::get_config_path();
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, contents)?;
        Ok(())
    }

    pub fn get_config_path() -> PathBuf {
        home_dir().join(".dbc").join(env_name()).join("config.json")
    }

    /// Configured symbol, else the one of the host locale.
    pub fn currency(&self) -> char {
        self.currency_symbol.unwrap_or_else(|| {
            let locale = LOCALE_VARIABLES
                .iter()
                .filter_map(|name| env::var(name).ok())
                .find(|value| !value.is_empty());
            locale.as_deref().map_or(GENERIC_CURRENCY, locale_currency)
        })
    }
}

/// `en_GB.UTF-8` -> `£`. Unknown territories get the generic sign.
pub fn locale_currency(locale: &str) -> char {
    let territory = locale
        .split(['.', '@'])
        .next()
        .and_then(|name| name.split_once('_'))
        .map(|(_, territory)| territory.to_ascii_uppercase());

    territory
        .and_then(|territory| {
            CURRENCIES
                .iter()
                .find(|(code, _)| *code == territory)
                .map(|(_, sign)| *sign)
        })
        .unwrap_or(GENERIC_CURRENCY)
}
