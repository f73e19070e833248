use assess_core::model::ImageRef;
use storage::repository::ImageRepository;
use tracing::warn;

/// Result of resolving a question image for display.
///
/// A failed resolution is non-fatal: the session continues and the host
/// renders an inline warning in place of the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedImage {
    Url(String),
    Missing { warning: &'static str },
}

/// Resolve a question-image reference to a displayable URL.
pub async fn resolve_prompt_image(
    images: &dyn ImageRepository,
    image: &ImageRef,
) -> ResolvedImage {
    match images.resolve_image(image).await {
        Ok(url) => ResolvedImage::Url(url),
        Err(err) => {
            warn!(reference = image.as_str(), error = %err, "question image failed to resolve");
            ResolvedImage::Missing {
                warning: "This question's image could not be loaded.",
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn resolution_failure_is_non_fatal() {
        let repo = InMemoryRepository::new();
        repo.put_image("img:q1", "https://media.example/q1.png").unwrap();

        let ok = resolve_prompt_image(&repo, &ImageRef::new("img:q1")).await;
        assert_eq!(ok, ResolvedImage::Url("https://media.example/q1.png".to_owned()));

        let missing = resolve_prompt_image(&repo, &ImageRef::new("img:gone")).await;
        assert!(matches!(missing, ResolvedImage::Missing { .. }));
    }
}
