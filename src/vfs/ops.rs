use std::fmt::{Display, Formatter};

/// Whether an operation observes the filesystem or mutates it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OpKind {
    Read,
    Write,
}

/// Every operation a backend exposes, including the derived names reported
/// for the generic `open` (`open_read` / `open_write`) and the fd-level
/// operations available on a [`FileHandle`](super::FileHandle).
///
/// The table behind this enum is authoritative: an operation is either in the
/// read set, in the write set, or on the explicit [`Op::UNCATEGORIZED`]
/// allow-list. Observers receiving an uncategorized operation must tolerate
/// it silently.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    Exists,
    ReadFile,
    ReadToString,
    ReadDir,
    Stat,
    Lstat,
    ReadLink,
    ReadJson,
    OpenRead,
    OpenWrite,
    WriteFile,
    AppendFile,
    WriteJson,
    WriteFileAtomic,
    Truncate,
    CreateFile,
    Mkdir,
    Rmdir,
    RemoveFile,
    Symlink,
    SetTimes,
    SetPermissions,
    Rename,
    Copy,
    FdRead,
    FdWrite,
    FdStat,
    FdSync,
}

impl Op {
    /// The full operation surface, used by tests to audit the tables below.
    pub const ALL: &[Op] = &[
        Op::Exists,
        Op::ReadFile,
        Op::ReadToString,
        Op::ReadDir,
        Op::Stat,
        Op::Lstat,
        Op::ReadLink,
        Op::ReadJson,
        Op::OpenRead,
        Op::OpenWrite,
        Op::WriteFile,
        Op::AppendFile,
        Op::WriteJson,
        Op::WriteFileAtomic,
        Op::Truncate,
        Op::CreateFile,
        Op::Mkdir,
        Op::Rmdir,
        Op::RemoveFile,
        Op::Symlink,
        Op::SetTimes,
        Op::SetPermissions,
        Op::Rename,
        Op::Copy,
        Op::FdRead,
        Op::FdWrite,
        Op::FdStat,
        Op::FdSync,
    ];

    /// Operations tracked on the surface but deliberately absent from both
    /// category sets.
    pub const UNCATEGORIZED: &[Op] = &[Op::Rename, Op::Copy];

    /// The stable string identifier reported to observers and logs.
    pub const fn name(self) -> &'static str {
        match self {
            Op::Exists => "exists",
            Op::ReadFile => "read_file",
            Op::ReadToString => "read_to_string",
            Op::ReadDir => "read_dir",
            Op::Stat => "stat",
            Op::Lstat => "lstat",
            Op::ReadLink => "read_link",
            Op::ReadJson => "read_json",
            Op::OpenRead => "open_read",
            Op::OpenWrite => "open_write",
            Op::WriteFile => "write_file",
            Op::AppendFile => "append_file",
            Op::WriteJson => "write_json",
            Op::WriteFileAtomic => "write_file_atomic",
            Op::Truncate => "truncate",
            Op::CreateFile => "create_file",
            Op::Mkdir => "mkdir",
            Op::Rmdir => "rmdir",
            Op::RemoveFile => "remove_file",
            Op::Symlink => "symlink",
            Op::SetTimes => "set_times",
            Op::SetPermissions => "set_permissions",
            Op::Rename => "rename",
            Op::Copy => "copy",
            Op::FdRead => "read",
            Op::FdWrite => "write",
            Op::FdStat => "fstat",
            Op::FdSync => "fsync",
        }
    }

    /// The operation's category, or [`None`] for the uncategorized set.
    pub const fn kind(self) -> Option<OpKind> {
        match self {
            Op::Exists
            | Op::ReadFile
            | Op::ReadToString
            | Op::ReadDir
            | Op::Stat
            | Op::Lstat
            | Op::ReadLink
            | Op::ReadJson
            | Op::OpenRead
            | Op::FdRead
            | Op::FdStat => Some(OpKind::Read),
            Op::OpenWrite
            | Op::WriteFile
            | Op::AppendFile
            | Op::WriteJson
            | Op::WriteFileAtomic
            | Op::Truncate
            | Op::CreateFile
            | Op::Mkdir
            | Op::Rmdir
            | Op::RemoveFile
            | Op::Symlink
            | Op::SetTimes
            | Op::SetPermissions
            | Op::FdWrite
            | Op::FdSync => Some(OpKind::Write),
            Op::Rename | Op::Copy => None,
        }
    }

    /// Index of the path-like argument in the operation's signature, or
    /// [`None`] for operations that act on an already-open handle and carry
    /// no path at all. Backends emit a used-path notification exactly when
    /// this returns [`Some`].
    pub const fn path_arg(self) -> Option<usize> {
        match self {
            Op::FdRead | Op::FdWrite | Op::FdStat | Op::FdSync => None,
            _ => Some(0),
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn every_op_is_categorized_or_explicitly_allowed() {
        for op in Op::ALL {
            assert_ne!(
                op.kind().is_some(),
                Op::UNCATEGORIZED.contains(op),
                "{op} must be in exactly one category set or on the allow-list",
            );
        }
    }

    #[test]
    fn read_and_write_sets_partition_the_surface() {
        let reads = Op::ALL
            .iter()
            .filter(|op| op.kind() == Some(OpKind::Read))
            .count();
        let writes = Op::ALL
            .iter()
            .filter(|op| op.kind() == Some(OpKind::Write))
            .count();

        assert_eq!(reads + writes + Op::UNCATEGORIZED.len(), Op::ALL.len());
    }

    #[test]
    fn names_are_unique() {
        let names: HashSet<&str> = Op::ALL.iter().map(|op| op.name()).collect();

        assert_eq!(names.len(), Op::ALL.len());
    }

    #[test]
    fn only_fd_level_ops_carry_no_path() {
        for op in Op::ALL {
            let fd_level = matches!(op, Op::FdRead | Op::FdWrite | Op::FdStat | Op::FdSync);

            assert_eq!(op.path_arg().is_none(), fd_level);
        }
    }
}
