//! Part-tree traversal: find every named attachment in a message body.
//!
//! The walk is depth-first pre-order. A part is checked before its
//! children, and a part that is itself an attachment is still descended
//! into. The iterator owns an explicit stack instead of recursing, so a
//! pathological tree cannot overflow the call stack.

use crate::error::{GrabError, Result};
use crate::model::attachment::AttachmentDescriptor;
use crate::model::message::{Message, MessageId, Part};

/// Maximum nesting depth of a part tree (the root is depth 0).
pub const MAX_PART_DEPTH: usize = 64;

/// Lazy iterator over the attachments of one part tree.
///
/// Yields `Err(StructuralLimitExceeded)` once if the tree nests deeper than
/// [`MAX_PART_DEPTH`], then stops.
pub struct AttachmentWalker<'a> {
    message_id: &'a MessageId,
    stack: Vec<(&'a Part, usize)>,
    max_depth: usize,
    done: bool,
}

impl<'a> AttachmentWalker<'a> {
    pub fn new(message_id: &'a MessageId, root: &'a Part) -> Self {
        Self::with_max_depth(message_id, root, MAX_PART_DEPTH)
    }

    pub fn with_max_depth(message_id: &'a MessageId, root: &'a Part, max_depth: usize) -> Self {
        Self {
            message_id,
            stack: vec![(root, 0)],
            max_depth,
            done: false,
        }
    }
}

impl Iterator for AttachmentWalker<'_> {
    type Item = Result<AttachmentDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        while let Some((part, depth)) = self.stack.pop() {
            if depth > self.max_depth {
                self.done = true;
                self.stack.clear();
                return Some(Err(GrabError::StructuralLimitExceeded {
                    message_id: self.message_id.to_string(),
                    depth: self.max_depth,
                }));
            }

            // Reversed so the first child is popped first.
            for child in part.parts.iter().rev() {
                self.stack.push((child, depth + 1));
            }

            if let Some(descriptor) = AttachmentDescriptor::from_part(self.message_id, part) {
                return Some(Ok(descriptor));
            }
        }
        self.done = true;
        None
    }
}

/// Walk the whole body of `message`.
pub fn walk(message: &Message) -> AttachmentWalker<'_> {
    AttachmentWalker::new(&message.id, &message.payload)
}

/// Collect every attachment of `message`, failing if the tree is too deep.
pub fn collect_attachments(message: &Message) -> Result<Vec<AttachmentDescriptor>> {
    walk(message).collect()
}
