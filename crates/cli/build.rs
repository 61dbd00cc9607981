use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let mut cmd = clap::Command::new("vaultline")
        .version("1.0.0")
        .author("Vaultline Contributors")
        .about("Ingest web resources into a knowledge vault")
        .arg(clap::arg!(<URL> "Source URL to ingest"))
        .arg(
            clap::arg!(--mode <MODE> "Ingestion mode (single, dossier)")
                .value_name("MODE")
                .default_value("single")
                .value_parser(["single", "dossier"]),
        )
        .arg(clap::arg!(--topic <TOPIC> "Topic of a dossier (required in dossier mode)"))
        .arg(
            clap::arg!(--source <URL> "Corroborating source URL for a dossier (repeatable)")
                .value_name("URL")
                .action(clap::ArgAction::Append),
        )
        .arg(clap::arg!(--"min-citations" <NUM> "Minimum number of usable sources for a dossier").default_value("3"))
        .arg(
            clap::arg!(--group <GROUP> "Target group (auto, agents, ai, supercomputing, projects)")
                .value_name("GROUP")
                .default_value("auto")
                .value_parser(["auto", "agents", "ai", "supercomputing", "projects"]),
        )
        .arg(
            clap::arg!(--level <LEVEL> "Difficulty level (auto, beginner, intermediate, advanced)")
                .value_name("LEVEL")
                .default_value("auto")
                .value_parser(["auto", "beginner", "intermediate", "advanced"]),
        )
        .arg(clap::arg!(--title <TITLE> "Title override"))
        .arg(clap::arg!(--"dry-run" "Print decisions without writing files"))
        .arg(
            clap::arg!(--vault <DIR> "Vault root directory")
                .value_name("DIR")
                .default_value(".")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            clap::arg!(--html <FILE> "Saved copy of the page to use instead of fetching it, or '-' for stdin")
                .value_name("FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(clap::arg!(--timeout <SECS> "HTTP timeout in seconds").default_value("30"))
        .arg(clap::arg!(--"user-agent" <UA> "Custom User-Agent for HTTP requests").value_name("UA"))
        .arg(clap::arg!(-v --verbose "Enable debug logging"));

    clap_complete::generate_to(clap_complete::shells::Bash, &mut cmd, "vaultline", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Zsh, &mut cmd, "vaultline", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Fish, &mut cmd, "vaultline", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::PowerShell, &mut cmd, "vaultline", &completions_dir).unwrap();

    println!(
        "cargo:warning=Shell completions generated in: {}",
        completions_dir.display()
    );
}
