use std::borrow::Cow;

/// Get the artifact file extension for a fence marker.
///
/// Checkers frequently refuse or misinterpret files without the extension they
/// expect, so artifacts are named after the documented language. Markers are the
/// names and aliases highlight.js accepts; extensions follow GitHub Linguist.
/// Unknown markers fall back to the marker itself with a dot prefix.
///
/// # Examples
///
/// ```
/// use doccheck::artifact_extension;
///
/// assert_eq!(artifact_extension("rs"), ".rs");
/// assert_eq!(artifact_extension("typescript"), ".ts");
/// assert_eq!(artifact_extension("fe"), ".fe");
/// ```
pub fn artifact_extension(marker: &str) -> Cow<'static, str> {
    let ext = match marker {
        "bash" | "sh" | "zsh" | "shell" => ".sh",
        "c" | "h" => ".c",
        "cpp" | "hpp" | "cc" | "c++" | "cxx" => ".cpp",
        "csharp" | "cs" => ".cs",
        "dart" => ".dart",
        "elixir" => ".ex",
        "erlang" | "erl" => ".erl",
        "fe" => ".fe",
        "fsharp" | "fs" => ".fs",
        "go" | "golang" => ".go",
        "haskell" | "hs" => ".hs",
        "java" => ".java",
        "javascript" | "js" | "jsx" => ".js",
        "json" | "jsonc" => ".json",
        "kotlin" | "kt" => ".kt",
        "lua" => ".lua",
        "nix" => ".nix",
        "ocaml" | "ml" => ".ml",
        "python" | "py" => ".py",
        "ruby" | "rb" => ".rb",
        "rust" | "rs" => ".rs",
        "scala" => ".scala",
        "solidity" | "sol" => ".sol",
        "sql" => ".sql",
        "swift" => ".swift",
        "toml" => ".toml",
        "typescript" | "ts" | "tsx" | "mts" | "cts" => ".ts",
        "yaml" | "yml" => ".yaml",
        "zig" => ".zig",
        "" => ".txt",
        _ => return Cow::Owned(format!(".{}", marker)),
    };

    Cow::Borrowed(ext)
}
