//! Guest-visible error codes.
//!
//! The numeric values are the WASI Preview 1 `errno` table. They are a
//! compatibility contract with guest code and must never be renumbered.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// Canonical error code returned to the guest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum FileSystemErrno {
    /// No error occurred.
    Success = 0,
    /// Argument list too long.
    TooBig = 1,
    /// Permission denied.
    Acces = 2,
    /// Address in use.
    AddrInUse = 3,
    /// Address not available.
    AddrNotAvail = 4,
    /// Address family not supported.
    AfNoSupport = 5,
    /// Resource unavailable, or operation would block.
    Again = 6,
    /// Connection already in progress.
    Already = 7,
    /// Bad file descriptor.
    Badf = 8,
    /// Bad message.
    BadMsg = 9,
    /// Device or resource busy.
    Busy = 10,
    /// Operation canceled.
    Canceled = 11,
    /// No child processes.
    Child = 12,
    /// Connection aborted.
    ConnAborted = 13,
    /// Connection refused.
    ConnRefused = 14,
    /// Connection reset.
    ConnReset = 15,
    /// Resource deadlock would occur.
    Deadlk = 16,
    /// Destination address required.
    DestAddrReq = 17,
    /// Mathematics argument out of domain of function.
    Dom = 18,
    /// Reserved.
    Dquot = 19,
    /// File exists.
    Exist = 20,
    /// Bad address.
    Fault = 21,
    /// File too large.
    Fbig = 22,
    /// Host is unreachable.
    HostUnreach = 23,
    /// Identifier removed.
    Idrm = 24,
    /// Illegal byte sequence.
    Ilseq = 25,
    /// Operation in progress.
    InProgress = 26,
    /// Interrupted function.
    Intr = 27,
    /// Invalid argument.
    Inval = 28,
    /// I/O error.
    Io = 29,
    /// Socket is connected.
    IsConn = 30,
    /// Is a directory.
    IsDir = 31,
    /// Too many levels of symbolic links.
    Loop = 32,
    /// File descriptor value too large.
    Mfile = 33,
    /// Too many links.
    Mlink = 34,
    /// Message too large.
    MsgSize = 35,
    /// Reserved.
    Multihop = 36,
    /// Filename too long.
    NameTooLong = 37,
    /// Network is down.
    NetDown = 38,
    /// Connection aborted by network.
    NetReset = 39,
    /// Network unreachable.
    NetUnreach = 40,
    /// Too many files open in system.
    Nfile = 41,
    /// No buffer space available.
    NoBufs = 42,
    /// No such device.
    NoDev = 43,
    /// No such file or directory.
    NoEnt = 44,
    /// Executable file format error.
    NoExec = 45,
    /// No locks available.
    NoLck = 46,
    /// Reserved.
    NoLink = 47,
    /// Not enough space.
    NoMem = 48,
    /// No message of the desired type.
    NoMsg = 49,
    /// Protocol not available.
    NoProtoOpt = 50,
    /// No space left on device.
    NoSpc = 51,
    /// Function not supported.
    NoSys = 52,
    /// The socket is not connected.
    NotConn = 53,
    /// Not a directory or a symbolic link to a directory.
    NotDir = 54,
    /// Directory not empty.
    NotEmpty = 55,
    /// State not recoverable.
    NotRecoverable = 56,
    /// Not a socket.
    NotSock = 57,
    /// Not supported, or operation not supported on socket.
    NotSup = 58,
    /// Inappropriate I/O control operation.
    NoTty = 59,
    /// No such device or address.
    Nxio = 60,
    /// Value too large to be stored in data type.
    Overflow = 61,
    /// Previous owner died.
    OwnerDead = 62,
    /// Operation not permitted.
    Perm = 63,
    /// Broken pipe.
    Pipe = 64,
    /// Protocol error.
    Proto = 65,
    /// Protocol not supported.
    ProtoNoSupport = 66,
    /// Protocol wrong type for socket.
    ProtoType = 67,
    /// Result too large.
    Range = 68,
    /// Read-only file system.
    Rofs = 69,
    /// Invalid seek.
    Spipe = 70,
    /// No such process.
    Srch = 71,
    /// Reserved.
    Stale = 72,
    /// Connection timed out.
    TimedOut = 73,
    /// Text file busy.
    TxtBsy = 74,
    /// Cross-device link.
    Xdev = 75,
    /// Extension: Capabilities insufficient.
    NotCapable = 76,
}

impl FileSystemErrno {
    /// The WASI Preview 1 numeric code.
    #[inline]
    pub fn wasi_preview1_code(self) -> u16 {
        self.into()
    }

    /// Looks up an errno by its WASI Preview 1 numeric code.
    pub fn from_wasi_preview1_code(code: u16) -> Option<Self> {
        Self::try_from(code).ok()
    }

    /// Stable upper-case name, e.g. `"BADF"`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::TooBig => "TOO_BIG",
            Self::Acces => "ACCES",
            Self::AddrInUse => "ADDRINUSE",
            Self::AddrNotAvail => "ADDRNOTAVAIL",
            Self::AfNoSupport => "AFNOSUPPORT",
            Self::Again => "AGAIN",
            Self::Already => "ALREADY",
            Self::Badf => "BADF",
            Self::BadMsg => "BADMSG",
            Self::Busy => "BUSY",
            Self::Canceled => "CANCELED",
            Self::Child => "CHILD",
            Self::ConnAborted => "CONNABORTED",
            Self::ConnRefused => "CONNREFUSED",
            Self::ConnReset => "CONNRESET",
            Self::Deadlk => "DEADLK",
            Self::DestAddrReq => "DESTADDRREQ",
            Self::Dom => "DOM",
            Self::Dquot => "DQUOT",
            Self::Exist => "EXIST",
            Self::Fault => "FAULT",
            Self::Fbig => "FBIG",
            Self::HostUnreach => "HOSTUNREACH",
            Self::Idrm => "IDRM",
            Self::Ilseq => "ILSEQ",
            Self::InProgress => "INPROGRESS",
            Self::Intr => "INTR",
            Self::Inval => "INVAL",
            Self::Io => "IO",
            Self::IsConn => "ISCONN",
            Self::IsDir => "ISDIR",
            Self::Loop => "LOOP",
            Self::Mfile => "MFILE",
            Self::Mlink => "MLINK",
            Self::MsgSize => "MSGSIZE",
            Self::Multihop => "MULTIHOP",
            Self::NameTooLong => "NAMETOOLONG",
            Self::NetDown => "NETDOWN",
            Self::NetReset => "NETRESET",
            Self::NetUnreach => "NETUNREACH",
            Self::Nfile => "NFILE",
            Self::NoBufs => "NOBUFS",
            Self::NoDev => "NODEV",
            Self::NoEnt => "NOENT",
            Self::NoExec => "NOEXEC",
            Self::NoLck => "NOLCK",
            Self::NoLink => "NOLINK",
            Self::NoMem => "NOMEM",
            Self::NoMsg => "NOMSG",
            Self::NoProtoOpt => "NOPROTOOPT",
            Self::NoSpc => "NOSPC",
            Self::NoSys => "NOSYS",
            Self::NotConn => "NOTCONN",
            Self::NotDir => "NOTDIR",
            Self::NotEmpty => "NOTEMPTY",
            Self::NotRecoverable => "NOTRECOVERABLE",
            Self::NotSock => "NOTSOCK",
            Self::NotSup => "NOTSUP",
            Self::NoTty => "NOTTY",
            Self::Nxio => "NXIO",
            Self::Overflow => "OVERFLOW",
            Self::OwnerDead => "OWNERDEAD",
            Self::Perm => "PERM",
            Self::Pipe => "PIPE",
            Self::Proto => "PROTO",
            Self::ProtoNoSupport => "PROTONOSUPPORT",
            Self::ProtoType => "PROTOTYPE",
            Self::Range => "RANGE",
            Self::Rofs => "ROFS",
            Self::Spipe => "SPIPE",
            Self::Srch => "SRCH",
            Self::Stale => "STALE",
            Self::TimedOut => "TIMEDOUT",
            Self::TxtBsy => "TXTBSY",
            Self::Xdev => "XDEV",
            Self::NotCapable => "NOTCAPABLE",
        }
    }
}

impl fmt::Display for FileSystemErrno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::FileSystemErrno;

    #[test]
    fn codes_are_contiguous() {
        for code in 0..=76u16 {
            let errno = FileSystemErrno::from_wasi_preview1_code(code)
                .unwrap_or_else(|| panic!("missing errno {code}"));
            assert_eq!(errno.wasi_preview1_code(), code);
        }
        assert_eq!(FileSystemErrno::from_wasi_preview1_code(77), None);
    }
}
