use crate::error;

pub(crate) fn get_hostname() -> Result<String, error::Error> {
    let hostname = nix::unistd::gethostname()?;
    Ok(hostname.to_string_lossy().to_string())
}
