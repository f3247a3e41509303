use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::crypto::{ALPHA_NUM, pseudorandom_string};

/// Return a sibling path of `path` usable as a temporary file, e.g.
/// `device.json` -> `device.json.sync-Ab3dE9`
pub fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".sync-");
    name.push(pseudorandom_string(ALPHA_NUM, 6));
    path.with_file_name(name)
}

/// Atomically creates a file with the given contents, overwriting
/// it if one exists.
///
/// The buffer is first written to a temporary file in the same directory,
/// synced, and then renamed over the destination. If this function returns
/// successfully the write completed durably.
///
/// Read: [Ensuring data reaches to disk](https://lwn.net/Articles/457667/).
pub async fn safe_write_all<P: AsRef<Path>, B: AsRef<[u8]>>(path: P, buf: B) -> io::Result<()> {
    let tmp_path = tmp_sibling(path.as_ref());
    let mut tmp_file = fs::File::create(&tmp_path).await?;

    tmp_file.write_all(buf.as_ref()).await?;
    tmp_file.flush().await?;
    tmp_file.sync_all().await?;
    drop(tmp_file);

    if let Err(err) = fs::rename(&tmp_path, path.as_ref()).await {
        // best effort, the rename failure is what gets reported
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err);
    }
    Ok(())
}
