use vfs_engine::dir::{Dir, DirListing, IteratorFlags, SortFlags};
use vfs_engine::vfs::MemoryFs;
use vfs_engine::{FileEngine, OpenMode, engine::resolver};

fn main() {
    let tmp = std::env::temp_dir();
    println!("Temp dir: {}", tmp.display());

    let root = tmp.join("my_vfs");
    let root = root.to_str().unwrap();

    // `Dir` is a view of a host directory; nothing is read until it is asked for
    let dir = Dir::new(root);

    // creates `/tmp/my_vfs/docs` together with `/tmp/my_vfs`
    dir.mkpath("docs").unwrap();

    // engines do the file I/O; `create` picks the backend that owns the path
    let mut first = resolver::create(&dir.file_path("docs/first.txt"));
    first.open(OpenMode::WRITE_ONLY, None).unwrap();
    first.write(b"Hello").unwrap();
    first.close().unwrap();

    // the same directory tree, held in memory and mounted under `mem:`;
    // the mount lasts as long as `_mount` lives
    let mem = MemoryFs::new();
    mem.mkfile("/second.txt", Some(b"World")).unwrap();
    let _mount = mem.mount("mem:");

    // reads the memory file through the same engine API
    let mut second = resolver::create("mem:/second.txt");
    second.open(OpenMode::READ_ONLY, None).unwrap();
    let mut buf = [0u8; 16];
    let n = second.read(&mut buf).unwrap();

    let first_content = std::fs::read(dir.file_path("docs/first.txt")).unwrap();
    println!(
        "{}, {}!",
        String::from_utf8_lossy(&first_content),
        String::from_utf8_lossy(&buf[..n])
    );

    // lists the whole tree, files only, largest first
    let listing = DirListing::new(root).flags(IteratorFlags::RECURSIVE | IteratorFlags::FILES_ONLY);
    for entry in &listing {
        println!("{} ({} bytes)", entry.file_path(), entry.size());
    }
    let mut docs = Dir::new(&dir.file_path("docs"));
    docs.set_sorting(SortFlags::SIZE);
    println!("docs: {:?}", docs.entry_list());

    // removes `/tmp/my_vfs` and everything below it
    dir.remove_recursively().unwrap();
    assert!(!dir.exists());
}
