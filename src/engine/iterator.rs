use crate::dir::FileInfo;

/// A backend cursor over the entries of one directory.
///
/// Created by [`super::FileEngine::begin_entry_list`]. The cursor starts *before* the first
/// entry; each successful [`EntryIterator::advance`] moves onto the next one.
pub trait EntryIterator: Send {
    /// The directory being listed.
    fn path(&self) -> &str;

    /// Moves to the next entry. Returns false once the listing is exhausted.
    fn advance(&mut self) -> bool;

    /// The name of the current entry, without directory part.
    fn current_file_name(&self) -> String;

    fn current_file_path(&self) -> String {
        let name = self.current_file_name();
        let path = self.path();
        if path.is_empty() || path.ends_with('/') {
            format!("{path}{name}")
        } else {
            format!("{path}/{name}")
        }
    }

    /// Full metadata of the current entry. Backends that already know some attributes
    /// should override this to seed the returned info.
    fn current_file_info(&self) -> FileInfo {
        FileInfo::new(self.current_file_path())
    }
}
