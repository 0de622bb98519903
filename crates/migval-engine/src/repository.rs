use migval_target::TargetRepository;
use migval_types::{ResultStatus, ValidationResult, ValidationType};
use tracing::info;

/// Compare the number of objects observed from the source with the number
/// the target holds. The result is the only one of its repository-level run,
/// so its index is 0.
pub fn repository_resource_count(observed: u64, repository: &dyn TargetRepository) -> ValidationResult {
    const TYPE: ValidationType = ValidationType::RepositoryResourceCount;
    let (status, details) = match repository.list_object_ids() {
        Ok(ids) => {
            let target = ids.len() as u64;
            info!(source = observed, target, "repository resource count");
            (
                ResultStatus::from_bool(observed == target),
                format!("source objects: {observed}, target objects: {target}"),
            )
        }
        Err(e) => (
            ResultStatus::Fail,
            format!("cannot list target objects: {e}"),
        ),
    };
    ValidationResult::repository(0, status, TYPE, details)
}
