use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;

/// 檔案類型描述：圖示、顏色與語言代號。 / Content-type descriptor: display icon, colour and language id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTypeInfo {
    pub icon: &'static str,
    pub color: &'static str,
    pub language: &'static str,
}

const fn info(icon: &'static str, color: &'static str, language: &'static str) -> FileTypeInfo {
    FileTypeInfo {
        icon,
        color,
        language,
    }
}

/// 未知檔案使用的預設描述。 / Descriptor used for anything the catalog does not know.
pub const DEFAULT_FILE: FileTypeInfo = info("fas fa-file", "#6B6B6B", "plaintext");

/// 資料夾圖示。 / Icon shown for directories.
pub const FOLDER_ICON: &str = "fas fa-folder";

// 完整檔名優先於副檔名。 / Exact file names win over extensions.
static SPECIAL_FILES: Lazy<HashMap<&'static str, FileTypeInfo>> = Lazy::new(|| {
    HashMap::from([
        ("dockerfile", info("fab fa-docker", "#2496ED", "dockerfile")),
        ("docker-compose.yml", info("fab fa-docker", "#2496ED", "yaml")),
        ("docker-compose.yaml", info("fab fa-docker", "#2496ED", "yaml")),
        ("jenkinsfile", info("fab fa-jenkins", "#D24939", "groovy")),
        ("package.json", info("fab fa-npm", "#CB3837", "json")),
        ("package-lock.json", info("fab fa-npm", "#CB3837", "json")),
        ("composer.json", info("fab fa-php", "#777BB4", "json")),
        ("yarn.lock", info("fab fa-yarn", "#2C8EBB", "yaml")),
        ("pnpm-lock.yaml", info("fas fa-box", "#F69220", "yaml")),
        ("gemfile", info("fas fa-gem", "#CC342D", "ruby")),
        ("requirements.txt", info("fab fa-python", "#3776AB", "plaintext")),
        ("cargo.toml", info("fas fa-cube", "#DEA584", "toml")),
        ("mix.exs", info("fas fa-cube", "#A100FF", "elixir")),
        ("webpack.config.js", info("fas fa-cube", "#8DD6F9", "javascript")),
        ("babel.config.js", info("fas fa-bolt", "#F9DC3E", "javascript")),
        ("tsconfig.json", info("fab fa-js-square", "#3178C6", "json")),
        ("vite.config.js", info("fas fa-bolt", "#646CFF", "javascript")),
        ("rollup.config.js", info("fas fa-scroll", "#FF3333", "javascript")),
        ("next.config.js", info("fas fa-file-code", "#000000", "javascript")),
        ("makefile", info("fas fa-cogs", "#9B9B9B", "makefile")),
        ("gulpfile.js", info("fas fa-glass-whiskey", "#CF4647", "javascript")),
        (".gitignore", info("fab fa-git-alt", "#F05032", "plaintext")),
        (".gitmodules", info("fab fa-git-alt", "#F05032", "plaintext")),
        (".gitattributes", info("fab fa-git-alt", "#F05032", "plaintext")),
        (".gitlab-ci.yml", info("fab fa-gitlab", "#FC6D26", "yaml")),
        (".travis.yml", info("fas fa-fire", "#3EAAAF", "yaml")),
    ])
});

static EXTENSIONS: Lazy<HashMap<&'static str, FileTypeInfo>> = Lazy::new(|| {
    HashMap::from([
        // web
        ("html", info("fab fa-html5", "#E34F26", "html")),
        ("css", info("fab fa-css3-alt", "#1572B6", "css")),
        ("scss", info("fab fa-sass", "#CC6699", "scss")),
        ("sass", info("fab fa-sass", "#CC6699", "scss")),
        ("less", info("fab fa-less", "#1D365D", "less")),
        ("js", info("fab fa-js-square", "#F7DF1E", "javascript")),
        ("jsx", info("fab fa-react", "#61DAFB", "javascript")),
        ("ts", info("fab fa-js-square", "#3178C6", "typescript")),
        ("tsx", info("fab fa-react", "#61DAFB", "typescript")),
        ("vue", info("fab fa-vuejs", "#4FC08D", "vue")),
        ("svelte", info("fas fa-circle", "#FF3E00", "svelte")),
        // languages
        ("py", info("fab fa-python", "#3776AB", "python")),
        ("java", info("fab fa-java", "#007396", "java")),
        ("cpp", info("fas fa-file-code", "#00599C", "cpp")),
        ("hpp", info("fas fa-file-code", "#00599C", "cpp")),
        ("c", info("fas fa-file-code", "#A8B9CC", "c")),
        ("h", info("fas fa-file-code", "#A8B9CC", "c")),
        ("cs", info("fas fa-file-code", "#239120", "csharp")),
        ("php", info("fab fa-php", "#777BB4", "php")),
        ("rb", info("fas fa-gem", "#CC342D", "ruby")),
        ("go", info("fas fa-file-code", "#00ADD8", "go")),
        ("rs", info("fas fa-gear", "#DEA584", "rust")),
        ("swift", info("fas fa-bolt", "#FA7343", "swift")),
        ("kt", info("fas fa-file-code", "#A97BFF", "kotlin")),
        ("scala", info("fas fa-file-code", "#DC322F", "scala")),
        ("dart", info("fas fa-file-code", "#0175C2", "dart")),
        // data and config
        ("json", info("fas fa-code", "red", "json")),
        ("yaml", info("fas fa-file-code", "#CB171E", "yaml")),
        ("yml", info("fas fa-file-code", "#CB171E", "yaml")),
        ("xml", info("fas fa-code", "#0060AC", "xml")),
        ("toml", info("fas fa-cog", "#9C4121", "toml")),
        ("ini", info("fas fa-sliders-h", "#6B6B6B", "ini")),
        ("env", info("fas fa-key", "#509941", "plaintext")),
        ("sql", info("fas fa-database", "#336791", "sql")),
        ("graphql", info("fas fa-project-diagram", "#E535AB", "graphql")),
        ("tf", info("fas fa-cloud", "#7B42BC", "hcl")),
        // docs
        ("md", info("fab fa-markdown", "#083FA6", "markdown")),
        ("mdx", info("fab fa-markdown", "#1B1F24", "markdown")),
        ("txt", info("fas fa-file-alt", "#6B6B6B", "plaintext")),
        ("csv", info("fas fa-file-csv", "#217346", "plaintext")),
        ("pdf", info("fas fa-file-pdf", "#F40F02", "plaintext")),
        // media
        ("png", info("fas fa-file-image", "#FFB13B", "plaintext")),
        ("jpg", info("fas fa-file-image", "#FFB13B", "plaintext")),
        ("jpeg", info("fas fa-file-image", "#FFB13B", "plaintext")),
        ("gif", info("fas fa-file-image", "#FFB13B", "plaintext")),
        ("svg", info("fas fa-bezier-curve", "#FFB13B", "xml")),
        ("mp3", info("fas fa-file-audio", "#1ED760", "plaintext")),
        ("mp4", info("fas fa-file-video", "#FF0000", "plaintext")),
        // shell
        ("sh", info("fas fa-terminal", "#4EAA25", "shell")),
        ("bash", info("fas fa-terminal", "#4EAA25", "shell")),
        ("zsh", info("fas fa-terminal", "#4EAA25", "shell")),
        ("fish", info("fas fa-terminal", "#4EAA25", "shell")),
        ("ps1", info("fas fa-terminal", "#012456", "powershell")),
        ("bat", info("fas fa-terminal", "#C1F12E", "bat")),
        ("cmd", info("fas fa-terminal", "#C1F12E", "bat")),
        // keys and certificates
        ("pem", info("fas fa-certificate", "#009688", "plaintext")),
        ("crt", info("fas fa-certificate", "#009688", "plaintext")),
        ("key", info("fas fa-key", "#FFA000", "plaintext")),
        ("pub", info("fas fa-key", "#FFA000", "plaintext")),
    ])
});

/// 依路徑取得檔案類型描述。 / Resolves the descriptor for `path`: exact file name first, then extension.
pub fn file_info(path: impl AsRef<Path>) -> FileTypeInfo {
    let Some(name) = path.as_ref().file_name() else {
        return DEFAULT_FILE;
    };
    let name = name.to_string_lossy().to_lowercase();
    if let Some(found) = SPECIAL_FILES.get(name.as_str()) {
        return *found;
    }
    name.rsplit_once('.')
        .and_then(|(_, extension)| EXTENSIONS.get(extension))
        .copied()
        .unwrap_or(DEFAULT_FILE)
}

pub fn icon(path: impl AsRef<Path>) -> &'static str {
    file_info(path).icon
}

pub fn color(path: impl AsRef<Path>) -> &'static str {
    file_info(path).color
}

/// 編輯器使用的語言代號。 / Language id handed to the editor surface.
pub fn language(path: impl AsRef<Path>) -> &'static str {
    file_info(path).language
}

/// 是否為以完整檔名辨識的特殊檔案。 / Whether `file_name` is recognised by its full name.
pub fn is_special_file(file_name: &str) -> bool {
    SPECIAL_FILES.contains_key(file_name.to_lowercase().as_str())
}
