//! Product reviews and their moderation.
//!
//! Only approved reviews are public. A product's `rating_avg` and
//! `rating_count` are recomputed in the same transaction as any change that
//! can affect them.

use sqlx::PgPool;
use tracing::instrument;

use emporium_core::{NotificationKind, ProductId, ReviewId, ReviewStatus};

use super::not_found_as;
use super::notifications::notify;
use crate::db::reviews::NewReview;
use crate::db::{OrderRepository, ProductRepository, ReviewRepository};
use crate::error::AppError;
use crate::models::notification::NewNotification;
use crate::models::review::{Review, ReviewFilter, ReviewInput};
use crate::models::{CurrentUser, Paginated, Pagination, optional_text, require_text};

const MAX_TITLE_LENGTH: usize = 200;
const MAX_BODY_LENGTH: usize = 5000;

pub struct ReviewService<'a> {
    pool: &'a PgPool,
    reviews: ReviewRepository<'a>,
    products: ProductRepository<'a>,
    orders: OrderRepository<'a>,
}

impl<'a> ReviewService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            reviews: ReviewRepository::new(pool),
            products: ProductRepository::new(pool),
            orders: OrderRepository::new(pool),
        }
    }

    /// Approved reviews of an active product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product is unknown or inactive.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
        page: Pagination,
    ) -> Result<Paginated<Review>, AppError> {
        self.require_product(product_id).await?;
        let filter = ReviewFilter {
            status: Some(ReviewStatus::Approved),
            product_id: Some(product_id),
        };
        self.list(&filter, page).await
    }

    /// Moderation queue.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ReviewFilter,
        page: Pagination,
    ) -> Result<Paginated<Review>, AppError> {
        let (items, total) = self.reviews.list(filter, page).await?;
        Ok(Paginated::new(items, total, page))
    }

    /// Submit a review. It waits for moderation before it is shown.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a rating outside 1..=5 or a blank
    /// body, `AppError::NotFound` for an unknown product and
    /// `AppError::Conflict` for a second review of the same product.
    #[instrument(skip(self, author, input), fields(user_id = %author.id, product_id = %product_id))]
    pub async fn create(
        &self,
        author: &CurrentUser,
        product_id: ProductId,
        input: ReviewInput,
    ) -> Result<Review, AppError> {
        check_rating(input.rating)?;
        let body =
            require_text("body", &input.body, MAX_BODY_LENGTH).map_err(AppError::BadRequest)?;
        let title = optional_text(input.title.as_deref());
        if title
            .as_ref()
            .is_some_and(|t| t.chars().count() > MAX_TITLE_LENGTH)
        {
            return Err(AppError::bad_request(format!(
                "title must be at most {MAX_TITLE_LENGTH} characters"
            )));
        }
        self.require_product(product_id).await?;

        let verified = self
            .orders
            .has_delivered_purchase(author.id, product_id)
            .await?;
        let review = self
            .reviews
            .create(&NewReview {
                product_id,
                user_id: author.id,
                rating: input.rating,
                title: title.as_deref(),
                body: &body,
                is_verified_purchase: verified,
            })
            .await?;

        tracing::info!(review_id = %review.id, verified, "Review submitted");
        Ok(review)
    }

    /// Approve or reject a review and tell its author.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for `PENDING`, `AppError::NotFound` if
    /// the review does not exist.
    #[instrument(skip(self), fields(review_id = %id, status = ?status))]
    pub async fn set_status(&self, id: ReviewId, status: ReviewStatus) -> Result<Review, AppError> {
        if status == ReviewStatus::Pending {
            return Err(AppError::bad_request(
                "a review can only be APPROVED or REJECTED",
            ));
        }

        let mut tx = self.pool.begin().await?;
        let (product_id, author) = ReviewRepository::set_status(&mut tx, id, status)
            .await
            .map_err(|e| not_found_as("Review", e))?;
        ProductRepository::refresh_rating(&mut tx, product_id).await?;

        let (title, body) = moderation_message(status);
        notify(
            &mut tx,
            &NewNotification {
                user_id: author,
                kind: NotificationKind::ReviewModerated,
                title: title.to_owned(),
                body: body.to_owned(),
                link: Some(format!("/products/{product_id}")),
            },
        )
        .await?;
        tx.commit().await?;

        tracing::info!(review_id = %id, product_id = %product_id, "Review moderated");
        self.reviews
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Review"))
    }

    /// Authors may delete their own reviews; moderators any.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the review does not exist or is not
    /// visible to `actor`.
    #[instrument(skip(self, actor), fields(review_id = %id, actor = %actor.id))]
    pub async fn delete(&self, actor: &CurrentUser, id: ReviewId) -> Result<(), AppError> {
        let review = self
            .reviews
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Review"))?;
        if review.user_id != actor.id && !actor.role.can_moderate() {
            return Err(AppError::not_found("Review"));
        }

        let mut tx = self.pool.begin().await?;
        let product_id = ReviewRepository::delete(&mut tx, id)
            .await
            .map_err(|e| not_found_as("Review", e))?;
        ProductRepository::refresh_rating(&mut tx, product_id).await?;
        tx.commit().await?;

        tracing::info!(review_id = %id, product_id = %product_id, "Review deleted");
        Ok(())
    }

    async fn require_product(&self, id: ProductId) -> Result<(), AppError> {
        match self.products.get_by_id(id).await? {
            Some(product) if product.is_active => Ok(()),
            _ => Err(AppError::not_found("Product")),
        }
    }
}

fn check_rating(rating: i16) -> Result<(), AppError> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(AppError::bad_request("rating must be between 1 and 5"))
    }
}

const fn moderation_message(status: ReviewStatus) -> (&'static str, &'static str) {
    match status {
        ReviewStatus::Approved => (
            "Your review is published",
            "Thank you! Your review passed moderation and is now visible to other customers.",
        ),
        ReviewStatus::Rejected | ReviewStatus::Pending => (
            "Your review was not published",
            "Your review did not pass moderation. Please check our review guidelines.",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(check_rating(0).is_err());
        assert!(check_rating(1).is_ok());
        assert!(check_rating(5).is_ok());
        assert!(check_rating(6).is_err());
    }

    #[test]
    fn test_moderation_messages_differ() {
        assert_ne!(
            moderation_message(ReviewStatus::Approved).0,
            moderation_message(ReviewStatus::Rejected).0
        );
    }
}
