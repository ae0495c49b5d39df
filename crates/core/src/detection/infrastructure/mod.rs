pub mod onnx_face_locator;
pub mod onnx_face_mesh_extractor;
pub mod onnx_session;
