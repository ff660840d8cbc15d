/// Column label constants for the car-owner export layout.
/// These are the labels the cleaning stages expect once headers are translated.

// Address source columns
pub const PROVINCE: &str = "Province";
pub const CITY: &str = "City";
pub const ADDRESS: &str = "address";
pub const POST_CODE: &str = "post code";

// Derived column produced by the address merge
pub const FULL_ADDRESS: &str = "Full Address";

// Identity columns
pub const EMAIL: &str = "Email";
pub const ID_NUMBER: &str = "ID Number";
pub const FRAME_NUMBER: &str = "Frame number";

/// Side columns moved into the garbage set alongside the address sources.
/// `Unnamed: 21` is the blank-headed 22nd column of the export.
pub const GARBAGE_SIDE_COLUMNS: [&str; 8] = [
    "Monthly salary",
    "marriage",
    "educate",
    "color",
    "gender",
    "Birthday",
    "industry",
    "Unnamed: 21",
];

/// Prefix given to columns whose header cell is empty
pub const UNNAMED_PREFIX: &str = "Unnamed: ";

// Garbage output bookkeeping columns
pub const REASON_COLUMN: &str = "reason";
pub const SOURCE_ROW_COLUMN: &str = "source_row";

pub const DEFAULT_CONFIG_FILE: &str = "cleaner.toml";
pub const DEFAULT_INPUT_PATH: &str = "data/car_owners.csv";
pub const DEFAULT_CLEAN_PATH: &str = "output/clean.csv";
pub const DEFAULT_GARBAGE_PATH: &str = "output/garbage.csv";

pub const DEFAULT_TRANSLATE_ENDPOINT: &str = "http://127.0.0.1:5000/translate";

/// Default composite key used for duplicate detection
pub fn default_dedupe_key() -> Vec<String> {
    vec![EMAIL.to_string(), ID_NUMBER.to_string(), FRAME_NUMBER.to_string()]
}

/// Default garbage side columns as owned labels
pub fn default_garbage_columns() -> Vec<String> {
    GARBAGE_SIDE_COLUMNS.iter().map(|c| c.to_string()).collect()
}
