/// 佈景主題的明暗類型。 / Brightness class of a theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeKind {
    Light,
    Dark,
    HighContrast,
}

impl ThemeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeKind::Light => "light",
            ThemeKind::Dark => "dark",
            ThemeKind::HighContrast => "high-contrast",
        }
    }
}

/// 內建佈景主題的描述。 / Descriptor of a built-in editor theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeDefinition {
    pub id: &'static str,
    pub label: &'static str,
    pub kind: ThemeKind,
    pub editor_background: &'static str,
}

/// 預設佈景主題代號。 / Theme id used when nothing (valid) was chosen.
pub const DEFAULT_THEME: &str = "vs-dark";

const BUILTIN_THEMES: [ThemeDefinition; 9] = [
    ThemeDefinition {
        id: "vs",
        label: "Visual Studio Light",
        kind: ThemeKind::Light,
        editor_background: "#FFFFFE",
    },
    ThemeDefinition {
        id: "vs-dark",
        label: "Visual Studio Dark",
        kind: ThemeKind::Dark,
        editor_background: "#1E1E1E",
    },
    ThemeDefinition {
        id: "hc-black",
        label: "High Contrast",
        kind: ThemeKind::HighContrast,
        editor_background: "#000000",
    },
    ThemeDefinition {
        id: "github-dark",
        label: "GitHub Dark",
        kind: ThemeKind::Dark,
        editor_background: "#24292E",
    },
    ThemeDefinition {
        id: "monokai",
        label: "Monokai",
        kind: ThemeKind::Dark,
        editor_background: "#272822",
    },
    ThemeDefinition {
        id: "dracula",
        label: "Dracula",
        kind: ThemeKind::Dark,
        editor_background: "#282A36",
    },
    ThemeDefinition {
        id: "night-owl",
        label: "Night Owl",
        kind: ThemeKind::Dark,
        editor_background: "#011627",
    },
    ThemeDefinition {
        id: "material-palenight",
        label: "Material Palenight",
        kind: ThemeKind::Dark,
        editor_background: "#292D3E",
    },
    ThemeDefinition {
        id: "solarized-dark",
        label: "Solarized Dark",
        kind: ThemeKind::Dark,
        editor_background: "#002B36",
    },
];

/// 可選用的佈景主題清單。 / Catalogue of selectable themes.
#[derive(Debug, Clone)]
pub struct ThemeCatalog {
    themes: Vec<ThemeDefinition>,
}

impl Default for ThemeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ThemeCatalog {
    /// 建立僅含內建主題的清單。 / Catalogue holding the built-in themes.
    pub fn builtin() -> Self {
        Self {
            themes: BUILTIN_THEMES.to_vec(),
        }
    }

    pub fn themes(&self) -> &[ThemeDefinition] {
        &self.themes
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.themes.iter().map(|theme| theme.id)
    }

    /// 依代號（不分大小寫）尋找主題。 / Finds a theme by id, ignoring ASCII case.
    pub fn find(&self, id: &str) -> Option<&ThemeDefinition> {
        let id = id.trim();
        self.themes
            .iter()
            .find(|theme| theme.id.eq_ignore_ascii_case(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// 找不到時退回預設主題。 / Like [`find`](Self::find) but falls back to the default theme.
    pub fn resolve(&self, id: &str) -> &ThemeDefinition {
        self.find(id)
            .or_else(|| self.find(DEFAULT_THEME))
            .unwrap_or(&BUILTIN_THEMES[1])
    }
}
