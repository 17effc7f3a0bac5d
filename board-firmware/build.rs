// Build-Script: Standort-Defaults einbacken und Linker für ESP32-C6 konfigurieren

/// Variablen aus `.env`, die als `option_env!` im Code landen
const SITE_DEFAULTS: [&str; 7] = [
    "BOARD_BROKER",
    "BOARD_BROKER_PORT",
    "BOARD_BROKER_USER",
    "BOARD_BROKER_PASSWORD",
    "BOARD_UPDATE_SERVER",
    "BOARD_PLATFORM_PASSWORD",
    "BOARD_NUMBER",
];

fn main() {
    // .env ist optional: fehlende Werte fallen auf die Defaults in config.rs zurück
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("⚠️  .env file nicht gefunden: {}", e);
        eprintln!("   Verwende eingebaute Defaults für Broker und Update-Server");
    }

    for key in SITE_DEFAULTS {
        println!("cargo:rerun-if-env-changed={}", key);
        if let Ok(value) = std::env::var(key) {
            println!("cargo:rustc-env={}={}", key, value);
        }
    }

    linker_be_nice();

    // defmt.x: Symbole für defmt's binäres Log-Format
    println!("cargo:rustc-link-arg=-Tdefmt.x");
    // linkall.x: Flash/RAM-Layout, muss als LETZTES kommen
    println!("cargo:rustc-link-arg=-Tlinkall.x");
}

// Wird vom Linker als "--error-handling-script" aufgerufen
fn linker_be_nice() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 2 {
        let kind = &args[1];
        let what = &args[2];

        match kind.as_str() {
            "undefined-symbol" => match what.as_str() {
                what if what.starts_with("_defmt_") => {
                    eprintln!();
                    eprintln!("💡 `defmt` not found - make sure `defmt.x` is added as a linker script");
                    eprintln!();
                }
                "_stack_start" => {
                    eprintln!();
                    eprintln!("💡 Is the linker script `linkall.x` missing?");
                    eprintln!();
                }
                what if what.starts_with("esp_rtos_") => {
                    eprintln!();
                    eprintln!(
                        "💡 `esp-radio` has no scheduler enabled. Make sure you have initialized `esp-rtos`."
                    );
                    eprintln!();
                }
                "free" | "malloc" | "calloc" | "malloc_internal" | "free_internal" => {
                    eprintln!();
                    eprintln!("💡 Did you forget the `esp-alloc` dependency?");
                    eprintln!();
                }
                _ => (),
            },
            _ => {
                std::process::exit(1);
            }
        }

        std::process::exit(0);
    }

    if let Ok(exe) = std::env::current_exe() {
        println!("cargo:rustc-link-arg=--error-handling-script={}", exe.display());
    }
}
