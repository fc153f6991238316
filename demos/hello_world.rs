use std::io::Write;
use std::process::Command;

use volatile_kit::{DirOptions, Scoped, ScopedDir};

fn main() -> anyhow::Result<()> {
    println!("Temp dir: {}", std::env::temp_dir().display());

    // creates `/tmp/tmpXXXXXX` and removes it, with everything inside, at the end of the scope
    let work = ScopedDir::with_options(&DirOptions::new().prefix("hello-"))?;
    println!("Work dir: {}", work.path().display());

    // the file outlives its stream: write, close, then let another process read it by path
    let greeting = volatile_kit::file()?.scope(|tmp| {
        tmp.write_all(b"Hello, World!")?;
        tmp.close();

        let output = Command::new("cat").arg(tmp.name()).output()?;
        Ok::<_, anyhow::Error>(String::from_utf8(output.stdout)?)
    })?;
    println!("{greeting}");

    #[cfg(unix)]
    {
        // a unix socket bound inside its own temporary directory
        let sock = volatile_kit::unix_socket()?;
        if let Some(listener) = sock.socket() {
            listener.listen(1)?;
        }
        std::os::unix::net::UnixStream::connect(sock.path())?;
        println!("Socket: {}", sock.path().display());

        // files created here are readable by the owner only
        let _umask = volatile_kit::umask(0o077);
    }

    // At this point `work` is dropped and its directory is deleted.
    // Call `release()` instead of dropping to see removal errors.
    Ok(())
}
