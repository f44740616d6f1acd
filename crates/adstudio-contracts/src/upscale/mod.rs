mod dimensions;
mod quota;

pub use dimensions::{upscale_dimensions, UpscaleDimensions, UpscaleScale};
pub use quota::{month_key, QuotaLedger, QuotaStatus, QuotaTracker, MONTHLY_FREE_QUOTA};
