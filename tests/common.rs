use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Once;

use rand::distributions::{Alphanumeric, DistString as _};
use tar::Archive;

pub struct TempDir(PathBuf);

impl TempDir {
    #[allow(unused)]
    pub fn new() -> std::io::Result<Self> {
        let tmpdir = Path::new(env!("CARGO_TARGET_TMPDIR"));
        let path = loop {
            let path = tmpdir.join(format!("justice-sandbox-test-{}", rand_string(32)));
            match std::fs::metadata(&path) {
                Ok(_) => continue,
                Err(v) if v.kind() == ErrorKind::NotFound => break path,
                Err(v) => return Err(v),
            }
        };
        std::fs::create_dir_all(&path)?;
        Ok(Self(path))
    }

    #[allow(unused)]
    pub fn join<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.0.join(path)
    }

    #[allow(unused)]
    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

#[allow(unused)]
pub fn rand_string(len: usize) -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), len)
}

/// Fetches the same busybox rootfs the teacher crate's own tests use, so a
/// sandboxed basedir has a real, tiny, statically-linked shell to run.
#[allow(unused)]
pub fn get_rootfs() -> std::io::Result<Archive<File>> {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        assert!(std::process::Command::new("curl")
            .arg("-fsSL")
            .arg("--retry")
            .arg("5")
            .arg("https://github.com/docker-library/busybox/raw/31d342ad033e27c18723a516a2274ab39547be27/stable/glibc/busybox.tar.xz")
            .arg("-o")
            .arg("rootfs.tar.xz")
            .current_dir("./tests")
            .spawn()
            .unwrap()
            .wait()
            .unwrap()
            .success());
        assert!(std::process::Command::new("xz")
            .arg("-df")
            .arg("rootfs.tar.xz")
            .current_dir("./tests")
            .spawn()
            .unwrap()
            .wait()
            .unwrap()
            .success());
    });
    let mut rootfs = Archive::new(File::open("./tests/rootfs.tar")?);
    rootfs.set_preserve_permissions(true);
    rootfs.set_preserve_ownerships(true);
    rootfs.set_unpack_xattrs(true);
    Ok(rootfs)
}
