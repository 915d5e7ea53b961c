use crate::buffer::FileBuffer;

#[derive(Debug)]
pub struct File {
    content: FileBuffer,
    readonly: bool,
}

impl File {
    pub(crate) fn new(bytes: Vec<u8>, readonly: bool) -> Self {
        Self {
            content: FileBuffer::from_bytes(bytes),
            readonly,
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn content(&self) -> &FileBuffer {
        &self.content
    }

    pub(crate) fn content_mut(&mut self) -> &mut FileBuffer {
        &mut self.content
    }
}
