//! Checks that `cd` into a fresh directory is reflected by `pwd`.
//!
//! Run with: `cargo run --example cd_test -- <shell> [config.toml]`
//! (or set `HARNESS_SHELL`). The exit code is 0 on pass, 1 on fail and 2
//! on error.

use shell_harness::prelude::*;

fn main() -> TestOutcome {
    init_logging();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => return TestOutcome::from_error(&e, None),
    };

    run_test(config, |c| {
        c.expect_prompt("shell should print a prompt at startup")?;
        c.sendline("mkdir cd-test-d")?;
        c.sendline("cd cd-test-d")?;
        c.sendline("pwd")?;
        c.expect_exact("cd-test-d", "pwd should show the directory we changed into")?;
        c.expect_prompt("shell should prompt again after pwd")?;
        c.test_success()?;
        Ok(())
    })
}

fn load_config() -> Result<HarnessConfig> {
    let mut args = std::env::args().skip(1);
    let shell = args.next();
    let file = args.next();

    let config = HarnessConfig::load(file.as_deref().map(std::path::Path::new))?;
    Ok(match shell {
        Some(shell) => config.command(shell),
        None => config,
    })
}
