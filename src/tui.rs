//! Utilities for terminal output during scanning.

/// Prints a red `[!]` warning. With the greppable and accessible flags it is
/// silent in greppable mode and unadorned in accessible mode.
#[macro_export]
macro_rules! warning {
    ($name:expr) => {
        println!("{} {}", ansi_term::Colour::Red.bold().paint("[!]"), $name);
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        // if not greppable then print, otherwise no else statement so do not print.
        if !$greppable {
            if $accessible {
                // Don't print the ascii art
                println!("{}", $name);
            } else {
                println!("{} {}", ansi_term::Colour::Red.bold().paint("[!]"), $name);
            }
        }
    };
}

/// Prints a blue `[~]` detail line, following the same flags as `warning!`.
#[macro_export]
macro_rules! detail {
    ($name:expr) => {
        println!("{} {}", ansi_term::Colour::Blue.bold().paint("[~]"), $name);
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        // if not greppable then print, otherwise no else statement so do not print.
        if !$greppable {
            if $accessible {
                // Don't print the ascii art
                println!("{}", $name);
            } else {
                println!("{} {}", ansi_term::Colour::Blue.bold().paint("[~]"), $name);
            }
        }
    };
}

/// Prints a green `[>]` line, following the same flags as `warning!`.
#[macro_export]
macro_rules! output {
    ($name:expr) => {
        println!(
            "{} {}",
            ansi_term::Colour::RGB(0, 255, 9).bold().paint("[>]"),
            $name
        );
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        // if not greppable then print, otherwise no else statement so do not print.
        if !$greppable {
            if $accessible {
                // Don't print the ascii art
                println!("{}", $name);
            } else {
                println!(
                    "{} {}",
                    ansi_term::Colour::RGB(0, 255, 9).bold().paint("[>]"),
                    $name
                );
            }
        }
    };
}

/// Prints a random one-liner under the banner.
#[macro_export]
macro_rules! funny_opening {
    // prints a funny quote / opening
    () => {
        use rand::seq::IndexedRandom;
        let quotes = vec![
            "Knock knock. Who's there? Every port, one batch at a time.",
            "Patience is a virtue; a timeout is a policy.",
            "Closed ports tell no tales.",
            "255.255.255.255 is as far as we go.",
            "Counting ports so you don't have to.",
        ];
        if let Some(quote) = quotes.choose(&mut rand::rng()) {
            println!("{}\n", quote);
        }
    };
}

/// The ASCII banner shown before a scan.
pub const BANNER: &str = r"
.----. .--.  .-. .-. .---.  .----. .----. .--.  .-. .-.
| {}  }/ {} \ |  `| |/   __}| {_  { {__  /  ___}/ {} \ |  `| |
| .-. \/  /\  \| |\  |\  {_ }| {__ .-._} }\     }/  /\  \| |\  |
`-' `-'`-'  `-'`-' `-' `---' `----'`----'  `---' `-'  `-'`-' `-'
";
