use crate::cli::{Cli, Shell};
use clap::CommandFactory;
use clap_complete::{generate, Shell as ClapShell};
use std::io::{self, Write};

impl From<Shell> for ClapShell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => ClapShell::Bash,
            Shell::Zsh => ClapShell::Zsh,
            Shell::Fish => ClapShell::Fish,
            Shell::PowerShell => ClapShell::PowerShell,
            Shell::Elvish => ClapShell::Elvish,
        }
    }
}

pub fn execute(shell: Shell) {
    write_completions(shell.clone(), &mut io::stdout());
    eprintln!("\n# {}", install_hint(&shell));
}

fn write_completions(shell: Shell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(ClapShell::from(shell), &mut cmd, bin_name, out);
}

fn install_hint(shell: &Shell) -> &'static str {
    match shell {
        Shell::Bash => "Add to ~/.bashrc: eval \"$(prx-aws-creds completions bash)\"",
        Shell::Zsh => "Add to ~/.zshrc: eval \"$(prx-aws-creds completions zsh)\"",
        Shell::Fish => {
            "Save with: prx-aws-creds completions fish > ~/.config/fish/completions/prx-aws-creds.fish"
        }
        Shell::PowerShell => {
            "Add to your profile: prx-aws-creds completions powershell | Out-String | Invoke-Expression"
        }
        Shell::Elvish => "Add to rc.elv: eval (prx-aws-creds completions elvish | slurp)",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bash_completions_cover_subcommands() {
        let mut out = Vec::new();
        write_completions(Shell::Bash, &mut out);
        let script = String::from_utf8(out).unwrap();
        assert!(script.contains("prx-aws-creds"));
        assert!(script.contains("whoami"));
        assert!(script.contains("profiles"));
    }
}
