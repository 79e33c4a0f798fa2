//! `luaenv pkg-config`: build information for C code embedding or extending
//! an installation.

use luaenv_core::pkg_config::{FlagStyle, PathStyle, PkgConfigReport, report};
use luaenv_core::ActivationRequest;

/// Restrict text output to one flag group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Only {
    Cflags,
    Libs,
}

pub fn execute_pkg_config(
    request: &ActivationRequest,
    path_style: PathStyle,
    flag_style: FlagStyle,
    only: Option<Only>,
    json: bool,
) -> miette::Result<String> {
    let mut activator = super::activator()?;
    let (installation, _) = activator.resolve(request)?;
    let report = report(&installation, path_style, flag_style)?;

    if json {
        return serde_json::to_string_pretty(&report)
            .map_err(|e| miette::miette!("Failed to serialize report: {e}"));
    }

    Ok(format_text(&report, only))
}

fn format_text(report: &PkgConfigReport, only: Option<Only>) -> String {
    let flags = &report.flags;
    match only {
        Some(Only::Cflags) => return flags.cflags.clone(),
        Some(Only::Libs) => {
            return [flags.ldflags.as_str(), flags.libs.as_str()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
        }
        None => {}
    }

    let paths = &report.paths;
    let found = |file: &Option<String>| file.clone().unwrap_or_else(|| "not found".to_string());

    let mut lines = vec![
        format!("{} ({})", report.name, report.id),
        format!("  lua {}, luarocks {}", report.lua_version, report.luarocks_version),
        format!(
            "  {} {} build, {}",
            report.build_config, report.build_type, report.architecture
        ),
        String::new(),
        format!("prefix:  {}", paths.prefix),
        format!("bin:     {}", paths.bin),
        format!("include: {}", paths.include),
        format!("lib:     {}", paths.lib),
        format!("share:   {}", paths.share),
        format!("doc:     {}", paths.doc),
        String::new(),
        format!("lua:     {}", found(&paths.lua_exe)),
        format!("luac:    {}", found(&paths.luac_exe)),
        format!("dll:     {}", found(&paths.lua_dll)),
        format!("lib:     {}", found(&paths.lua_lib)),
        format!("lua.h:   {}", found(&paths.lua_h)),
        String::new(),
        format!("cflags:  {}", flags.cflags),
        format!("ldflags: {}", flags.ldflags),
        format!("libs:    {}", flags.libs),
    ];
    if let Some(alias) = &report.alias {
        lines.insert(1, format!("  alias {alias}"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use luaenv_core::{Installation, InstallationStatus};
    use tempfile::TempDir;

    fn installation(root: &std::path::Path) -> Installation {
        Installation {
            id: "abcd1234".into(),
            name: "Lua 5.4".into(),
            lua_version: "5.4.8".into(),
            luarocks_version: "3.12.2".into(),
            installation_path: root.join("installations/abcd1234"),
            environment_path: root.join("environments/abcd1234"),
            architecture: "x64".into(),
            build_type: "dll".into(),
            build_config: "release".into(),
            status: InstallationStatus::Active,
            last_used: None,
            packages: None,
            alias: None,
            created: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_only_flags() {
        let temp = TempDir::new().unwrap();
        let inst = installation(temp.path());
        std::fs::create_dir_all(inst.installation_path.join("include")).unwrap();
        std::fs::create_dir_all(inst.installation_path.join("lib")).unwrap();

        let report = report(&inst, PathStyle::Unix, FlagStyle::Gnu).unwrap();
        let cflags = format_text(&report, Some(Only::Cflags));
        assert!(cflags.starts_with("-I"));
        assert!(cflags.ends_with("/installations/abcd1234/include\""));

        let libs = format_text(&report, Some(Only::Libs));
        assert!(libs.starts_with("-L"));
        assert!(libs.ends_with(&report.flags.libs));
    }

    #[test]
    fn test_full_text_marks_missing_files() {
        let temp = TempDir::new().unwrap();
        let inst = installation(temp.path());
        std::fs::create_dir_all(&inst.installation_path).unwrap();

        let text = format_text(&report(&inst, PathStyle::Native, FlagStyle::Msvc).unwrap(), None);
        assert!(text.starts_with("Lua 5.4 (abcd1234)"));
        assert!(text.contains("lua.h:   not found"));
        assert!(text.contains("cflags:  \n"));
    }
}
