use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let mut cmd = clap::Command::new("fitmark")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Distill HTML into cited Markdown")
        .arg(clap::arg!(<INPUT> "Local HTML file, or '-' for stdin"))
        .arg(
            clap::arg!(-o --output <FILE> "Output file (default: stdout)")
                .value_name("FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            clap::arg!(-f --format <FORMAT> "Output format")
                .value_name("FORMAT")
                .default_value("fit")
                .value_parser(["fit", "raw", "citations", "references", "html", "json"]),
        )
        .arg(
            clap::arg!(-c --config <FILE> "JSON file with conversion settings")
                .value_name("FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(clap::arg!(-b --"base-url" <URL> "Base URL used to resolve relative links").value_name("URL"))
        .arg(
            clap::arg!(--"threshold-type" <TYPE> "Pruning threshold mode")
                .value_name("TYPE")
                .value_parser(["fixed", "dynamic"]),
        )
        .arg(clap::arg!(--threshold <NUM> "Pruning threshold"))
        .arg(clap::arg!(--"min-words" <NUM> "Minimum words for a node to be kept"))
        .arg(clap::arg!(--"no-pruning" "Skip pruning; fit output is empty"))
        .arg(clap::arg!(--"no-citations" "Keep inline links instead of citations"))
        .arg(clap::arg!(--"body-width" <NUM> "Wrap plain lines at this width (0 disables)"))
        .arg(clap::arg!(--"ignore-links" "Drop link markup, keeping link text"))
        .arg(clap::arg!(--"ignore-images" "Drop images"))
        .arg(clap::arg!(-v --verbose "Enable debug logging"));

    clap_complete::generate_to(clap_complete::shells::Bash, &mut cmd, "fitmark", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Zsh, &mut cmd, "fitmark", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Fish, &mut cmd, "fitmark", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::PowerShell, &mut cmd, "fitmark", &completions_dir).unwrap();

    println!(
        "cargo:warning=Shell completions generated in: {}",
        completions_dir.display()
    );
}
