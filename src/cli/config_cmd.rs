use anyhow::Result;

use influence_tracker::core::config::AppConfig;

pub fn init() -> Result<()> {
    let path = AppConfig::config_path();
    if path.exists() {
        eprintln!("Config file already exists at {}", path.display());
        eprintln!("Remove it first if you want to regenerate.");
        return Ok(());
    }

    let config = AppConfig::default();
    match config.save() {
        Ok(path) => {
            println!("Generated config at {}", path.display());
            println!("  Cache directory: {}", config.cache_dir().display());
            let enabled: Vec<String> = config
                .scorers
                .enabled()
                .iter()
                .map(|(id, weight)| format!("{} ({})", id, weight))
                .collect();
            println!("  Scorers: {}", enabled.join(", "));
        }
        Err(e) => {
            eprintln!("Failed to generate config: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}

pub fn check() -> Result<()> {
    let path = AppConfig::config_path();
    if !path.exists() {
        eprintln!("No config file found at {}", path.display());
        eprintln!("Run `itr config init` to create one.");
        return Ok(());
    }

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let issues = config.validate();
    if issues.is_empty() {
        println!("Config is valid: {}", path.display());
        for p in &config.providers {
            let policy = p.policy().describe();
            let credentials = match (&p.api_key_env, p.has_credentials()) {
                (None, _) => String::new(),
                (Some(var), true) => format!(", {} set", var),
                (Some(var), false) => format!(", {} missing", var),
            };
            println!("  {}: {}{}", p.id, policy, credentials);
        }
    } else {
        eprintln!("Config issues found in {}:", path.display());
        for issue in &issues {
            eprintln!("  - {}", issue);
        }
        std::process::exit(1);
    }
    Ok(())
}

pub fn path() -> Result<()> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}
