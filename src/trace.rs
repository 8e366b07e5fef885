//! User-visible run trace.
//!
//! Every external command and every working-directory transition, including
//! the restore when a scope ends, is printed as it happens, so the last line
//! of a failed run names the failing step.

use std::path::Path;

pub(crate) fn command(argv: &[String]) {
    emit(format!("+ {}", argv.join(" ")));
}

pub(crate) fn change_dir(dir: &Path) {
    emit(format!("cd {}", dir.display()));
}

fn emit(line: String) {
    println!("{line}");
    #[cfg(test)]
    captured::LINES.with(|lines| lines.borrow_mut().push(line));
}

#[cfg(test)]
pub(crate) mod captured {
    use std::cell::RefCell;

    thread_local! {
        pub(super) static LINES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    /// Drain the lines traced on this thread.
    pub(crate) fn take() -> Vec<String> {
        LINES.with(|lines| std::mem::take(&mut *lines.borrow_mut()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_and_directories_are_traced() {
        captured::take();
        command(&["createrepo".to_string(), "--update".to_string(), ".".to_string()]);
        change_dir(Path::new("/srv/repo/SRPMS"));
        assert_eq!(
            captured::take(),
            vec!["+ createrepo --update .", "cd /srv/repo/SRPMS"]
        );
    }
}
