//! Directory-level API: file metadata, listings, sorting and the [`Dir`] view.

mod entry;
mod file_info;
mod filters;
mod listing;
mod sort;
mod view;

pub use entry::DirEntry;
pub use file_info::FileInfo;
pub use filters::{DirFilters, IteratorFlags, NameFilter, SortFlags, match_glob, name_filters_from_string};
pub use listing::{DirListing, DirListingIter};
pub use sort::sort_file_infos;
pub use view::Dir;
