use console::Style;
use dgist_login::Credentials;
use dialoguer::{Input, Password};

/// Asks for the portal ID and password on the terminal.
pub(crate) fn prompt_credentials() -> anyhow::Result<Credentials> {
    let bold = Style::new().bold();
    eprintln!(
        "{} Credentials are stored locally and used to fill the portal login form.",
        bold.apply_to(">>")
    );

    let username: String = Input::new()
        .with_prompt("DGIST ID")
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("ID cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let password = Password::new()
        .with_prompt("Password")
        .interact()?;
    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    Ok(Credentials {
        username: username.trim().to_string(),
        password,
    })
}

/// Renders a code the way the terminal notifier highlights things.
pub(crate) fn print_code(code: &str) {
    let bold = Style::new().bold();
    let cyan = Style::new().cyan().bold();
    println!("{} Last code: {}", bold.apply_to(">>"), cyan.apply_to(code));
}
