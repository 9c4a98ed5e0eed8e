use crate::error::ExamResult;

/// Similarity search over a chunked subject corpus.
///
/// Implementations own the ranking criteria; callers only get an
/// ordered sequence of chunk texts for a free-text query, restricted
/// to one subject partition.
pub trait Retriever {
    fn retrieve(&self, subject: &str, query: &str, k: usize) -> ExamResult<Vec<String>>;
}
