pub use crate::metadata::debug::{
    DebugInfoWriter, Import, LocalScopeData, MethodDebugData, NullDebugWriter, SequencePoint,
};
pub use crate::metadata::emit::{
    CancellationFlag, EmitDiagnostic, EmitSummary, MetadataAssembler, MetadataBuffers,
};
pub use crate::metadata::model::{
    AssemblyData, AssemblyRefData, AssemblyRefHandle, AttributeValue, ConstantValue,
    CustomAttributeData, EventData, ExportScope, ExportedTypeData, FieldData, FieldHandle,
    FileData, FileHandle, GenerationKind, ManifestResourceData, MethodBodyData, MethodData,
    MethodHandle, ModuleData, ModuleRefHandle, ParamData, PropertyData, ResolutionScope,
    ResourceLocation, TypeDefData, TypeDefOrRef, TypeHandle, TypeRefData, TypeRefHandle,
};
pub use crate::metadata::signatures::{MethodSignature, TypeSig};
pub use crate::metadata::tables::TableId;
pub use crate::metadata::token::Token;
pub use crate::{Error, Result};
