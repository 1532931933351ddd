pub mod preferences;
pub mod theme;

pub use preferences::{
    EvictionMode, Preferences, PreferencesError, PreferencesStore, SessionPreferences,
    UiPreferences, MAX_OPEN_RANGE,
};
pub use theme::{ThemeCatalog, ThemeDefinition, ThemeKind, DEFAULT_THEME};
