use uuid::Uuid;

use crate::recipes::repo::Recipe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

/// Whether `actor` may perform `op` on `recipe`. Reads are open for
/// published recipes and author-only otherwise. Writes are author-only;
/// publication never grants them.
pub fn allows(actor: Option<Uuid>, recipe: &Recipe, op: Operation) -> bool {
    let is_author = actor == Some(recipe.author_id);
    match op {
        Operation::Read => recipe.is_publish || is_author,
        Operation::Write => is_author,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn recipe(author_id: Uuid, is_publish: bool) -> Recipe {
        let now = OffsetDateTime::now_utc();
        Recipe {
            id: Uuid::new_v4(),
            author_id,
            author: "alice".into(),
            name: "Pasta".into(),
            description: "Simple pasta".into(),
            num_of_servings: 2,
            cook_time: 20,
            directions: "Boil, drain, serve".into(),
            is_publish,
            image: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn published_recipe_is_readable_by_everyone() {
        let author = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let r = recipe(author, true);
        assert!(allows(None, &r, Operation::Read));
        assert!(allows(Some(stranger), &r, Operation::Read));
        assert!(allows(Some(author), &r, Operation::Read));
    }

    #[test]
    fn draft_is_readable_only_by_its_author() {
        let author = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let r = recipe(author, false);
        assert!(!allows(None, &r, Operation::Read));
        assert!(!allows(Some(stranger), &r, Operation::Read));
        assert!(allows(Some(author), &r, Operation::Read));
    }

    #[test]
    fn writes_are_author_only_regardless_of_publication() {
        let author = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        for is_publish in [true, false] {
            let r = recipe(author, is_publish);
            assert!(allows(Some(author), &r, Operation::Write));
            assert!(!allows(Some(stranger), &r, Operation::Write));
            assert!(!allows(None, &r, Operation::Write));
        }
    }
}
