mod create_modify;
mod find;
mod scan;
mod types;
mod utils;

pub use create_modify::{create_gpt, create_partition, delete_partition, shrink_partition};
pub use find::find_free_space;
pub use scan::scan_partitions;
pub use types::{FreeRegion, GptError};
pub use utils::{align_lba, calculate_total_free_space, mb_to_lba};
