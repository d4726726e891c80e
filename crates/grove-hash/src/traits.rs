use std::io;

use serde::Serialize;
use xxhash_rust::xxh64::Xxh64;

mod private {
    pub trait Sealed {}

    impl Sealed for crate::FileHashes {}
    impl Sealed for crate::TaskHashable<'_> {}
    impl Sealed for crate::LockFilePackages {}
}

use private::Sealed;

/// Canonical encode-then-hash. Only the records defined in this crate can be
/// hashed, which keeps every fingerprint on the same encoding.
pub trait GroveHash: Sealed {
    fn hash(&self) -> String;
}

impl<T> GroveHash for T
where
    T: Sealed + Serialize,
{
    fn hash(&self) -> String {
        let mut writer = HashWriter(Xxh64::new(0));
        serde_json::to_writer(&mut writer, self)
            .expect("hashable records contain only string keyed maps");
        let out = writer.0.digest();
        format!("{out:016x}")
    }
}

struct HashWriter(Xxh64);

impl io::Write for HashWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
