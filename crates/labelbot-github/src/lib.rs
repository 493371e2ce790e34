//! GitHub REST plumbing for the labeling bot: the API client used to post
//! comments, apply labels, and tally comment reactions, plus the pure
//! comment-rendering helpers.

pub mod client;
pub mod comment;
pub mod transport;

pub use client::{
    CreatedComment, GithubApiClient, IssuePlatform, IssueRef, ReactionTally,
};
pub use comment::render_prediction_comment;
