use std::time::SystemTime;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeType {
    File,
    Directory,
}

/// One file or directory held by a [`super::MemoryFs`].
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    node_type: NodeType,
    content: Vec<u8>,
    modified: SystemTime,
}

impl Node {
    pub fn new(node_type: NodeType) -> Node {
        Node {
            node_type,
            content: Vec::new(),
            modified: SystemTime::now(),
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn is_file(&self) -> bool {
        self.node_type == NodeType::File
    }

    pub fn is_dir(&self) -> bool {
        self.node_type == NodeType::Directory
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn len(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn set_modified(&mut self, time: SystemTime) {
        self.modified = time;
    }

    pub fn set_content(&mut self, content: &[u8]) {
        self.content = content.to_vec();
        self.touch();
    }

    pub fn append_content(&mut self, content: &[u8]) {
        self.content.extend_from_slice(content);
        self.touch();
    }

    /// Writes `data` at `offset`, zero-filling any gap past the current end.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) {
        let end = offset + data.len();
        if self.content.len() < end {
            self.content.resize(end, 0);
        }
        self.content[offset..end].copy_from_slice(data);
        self.touch();
    }

    /// Copies bytes starting at `offset` into `buf`; returns how many were copied.
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        if offset >= self.content.len() {
            return 0;
        }
        let n = buf.len().min(self.content.len() - offset);
        buf[..n].copy_from_slice(&self.content[offset..offset + n]);
        n
    }

    pub fn resize(&mut self, len: usize) {
        self.content.resize(len, 0);
        self.touch();
    }

    fn touch(&mut self) {
        self.modified = SystemTime::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read_at() {
        let mut node = Node::new(NodeType::File);
        node.write_at(2, b"cd");
        assert_eq!(node.content(), b"\0\0cd");
        node.write_at(0, b"ab");
        assert_eq!(node.content(), b"abcd");

        let mut buf = [0u8; 3];
        assert_eq!(node.read_at(1, &mut buf), 3);
        assert_eq!(&buf, b"bcd");
        assert_eq!(node.read_at(3, &mut buf), 1);
        assert_eq!(node.read_at(9, &mut buf), 0);
    }

    #[test]
    fn test_content_updates_touch_modified() {
        let mut node = Node::new(NodeType::File);
        node.set_modified(SystemTime::UNIX_EPOCH);
        node.append_content(b"x");
        assert!(node.modified() > SystemTime::UNIX_EPOCH);
        node.resize(0);
        assert!(node.is_empty());
    }
}
